//! Screen registry.
//!
//! Each [`ViewId`] maps to a constructor in a static table; the shell never
//! dispatches on view names.

use serde::Serialize;

use tonerledger_auth::permissions::{CATALOG_MANAGE, TONER_READ, USERS_MANAGE};
use tonerledger_auth::Permission;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ViewId {
    Stock,
    Movements,
    Recharges,
    Vendors,
    Catalog,
    Users,
    Reports,
}

/// What the shell needs to show a view: its title and who may open it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct View {
    pub id: ViewId,
    pub title: &'static str,
    pub required: Permission,
}

type ViewConstructor = fn() -> View;

/// Indexed by `ViewId as usize`.
const CONSTRUCTORS: [ViewConstructor; 7] = [
    stock_view,
    movements_view,
    recharges_view,
    vendors_view,
    catalog_view,
    users_view,
    reports_view,
];

impl ViewId {
    pub const ALL: [ViewId; 7] = [
        ViewId::Stock,
        ViewId::Movements,
        ViewId::Recharges,
        ViewId::Vendors,
        ViewId::Catalog,
        ViewId::Users,
        ViewId::Reports,
    ];

    pub fn build(self) -> View {
        CONSTRUCTORS[self as usize]()
    }
}

fn stock_view() -> View {
    View {
        id: ViewId::Stock,
        title: "Toner stock",
        required: TONER_READ,
    }
}

fn movements_view() -> View {
    View {
        id: ViewId::Movements,
        title: "Movements",
        required: TONER_READ,
    }
}

fn recharges_view() -> View {
    View {
        id: ViewId::Recharges,
        title: "Recharges",
        required: TONER_READ,
    }
}

fn vendors_view() -> View {
    View {
        id: ViewId::Vendors,
        title: "Recharge vendors",
        required: CATALOG_MANAGE,
    }
}

fn catalog_view() -> View {
    View {
        id: ViewId::Catalog,
        title: "Brands and models",
        required: CATALOG_MANAGE,
    }
}

fn users_view() -> View {
    View {
        id: ViewId::Users,
        title: "Users",
        required: USERS_MANAGE,
    }
}

fn reports_view() -> View {
    View {
        id: ViewId::Reports,
        title: "Reports",
        required: TONER_READ,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_matches_ids() {
        for id in ViewId::ALL {
            assert_eq!(id.build().id, id);
        }
    }

    #[test]
    fn titles_are_unique() {
        let mut titles: Vec<_> = ViewId::ALL.iter().map(|id| id.build().title).collect();
        titles.sort();
        titles.dedup();
        assert_eq!(titles.len(), ViewId::ALL.len());
    }
}

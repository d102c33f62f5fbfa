use tonerledger_auth::{Role, SessionToken};
use tonerledger_core::LedgerError;
use tonerledger_desktop::{AppState, Commands, ViewId};
use tonerledger_infra::connect_in_memory;
use tonerledger_inventory::{NewVendor, RechargeStatus};

async fn setup() -> (Commands, SessionToken) {
    let pool = connect_in_memory().await.unwrap();
    let state = AppState::new(pool, chrono::Duration::hours(8));
    state
        .users
        .bootstrap_admin("admin", "Administrator", "toner-admin-1")
        .await
        .unwrap();

    let commands = Commands::new(state);
    let token = commands.login("admin", "toner-admin-1").await.unwrap();
    (commands, token)
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let (commands, _) = setup().await;
    let err = commands.login("admin", "nope-nope-nope").await.unwrap_err();
    assert!(matches!(err, LedgerError::Unauthorized(_)));
}

#[tokio::test]
async fn unknown_token_is_rejected() {
    let (commands, _) = setup().await;
    let stranger = SessionToken::from("not-a-session".to_string());
    let err = commands.list_stock(&stranger).await.unwrap_err();
    assert!(matches!(err, LedgerError::Unauthorized(_)));
}

#[tokio::test]
async fn logout_ends_the_session() {
    let (commands, token) = setup().await;
    commands.logout(&token).unwrap();
    assert!(commands.current_session(&token).is_err());
}

#[tokio::test]
async fn full_recharge_cycle_through_commands() {
    let (commands, token) = setup().await;

    let brand = commands.create_brand(&token, "HP").await.unwrap();
    let model = commands.create_model(&token, brand, "CF258A").await.unwrap();
    let vendor = commands
        .create_vendor(
            &token,
            &NewVendor {
                name: "Recargas Sur".into(),
                ..NewVendor::default()
            },
        )
        .await
        .unwrap();

    commands.load_stock(&token, model, 50, "").await.unwrap();
    let recharge = commands
        .send_to_recharge(&token, model, 20, vendor, "")
        .await
        .unwrap();
    assert_eq!(commands.get_stock(&token, model).await.unwrap(), 30);
    assert_eq!(
        commands.get_recharge(&token, recharge).await.unwrap().status,
        RechargeStatus::Sent
    );

    commands
        .receive_from_recharge(&token, recharge, "")
        .await
        .unwrap();
    assert_eq!(commands.get_stock(&token, model).await.unwrap(), 50);
    assert_eq!(
        commands.get_recharge(&token, recharge).await.unwrap().status,
        RechargeStatus::Received
    );

    let err = commands.delete_vendor(&token, vendor).await.unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));
}

#[tokio::test]
async fn over_withdrawal_leaves_stock_unchanged() {
    let (commands, token) = setup().await;
    let brand = commands.create_brand(&token, "Brother").await.unwrap();
    let model = commands.create_model(&token, brand, "TN-660").await.unwrap();
    commands.load_stock(&token, model, 10, "").await.unwrap();

    let err = commands
        .withdraw(&token, model, 15, None, None, "")
        .await
        .unwrap_err();

    assert_eq!(err.available(), Some(10));
    assert_eq!(commands.get_stock(&token, model).await.unwrap(), 10);
}

#[tokio::test]
async fn viewer_can_read_but_not_move_stock() {
    let (commands, admin) = setup().await;
    let brand = commands.create_brand(&admin, "Canon").await.unwrap();
    let model = commands.create_model(&admin, brand, "CRG-052").await.unwrap();
    commands
        .create_user(&admin, "reader", "Read Only", Role::Viewer, "reader-pass")
        .await
        .unwrap();

    let viewer = commands.login("reader", "reader-pass").await.unwrap();
    assert_eq!(commands.list_stock(&viewer).await.unwrap().len(), 1);

    let err = commands.load_stock(&viewer, model, 1, "").await.unwrap_err();
    assert!(matches!(err, LedgerError::Unauthorized(_)));
    assert!(commands.open_view(&viewer, ViewId::Users).is_err());

    let views: Vec<ViewId> = commands
        .available_views(&viewer)
        .unwrap()
        .into_iter()
        .map(|v| v.id)
        .collect();
    assert_eq!(
        views,
        [ViewId::Stock, ViewId::Movements, ViewId::Recharges, ViewId::Reports]
    );
}

#[tokio::test]
async fn deactivated_user_cannot_log_in() {
    let (commands, admin) = setup().await;
    let clerk = commands
        .create_user(&admin, "clerk", "Clerk", Role::Operator, "clerk-pass-1")
        .await
        .unwrap();
    commands.set_user_active(&admin, clerk, false).await.unwrap();

    let err = commands.login("clerk", "clerk-pass-1").await.unwrap_err();
    assert!(matches!(err, LedgerError::Unauthorized(_)));
    assert_eq!(commands.recent_audit(&admin, 10).await.unwrap()[0].action, "UPDATE");
}

use std::any::type_name;

use meshestra_persistence::Repository;
use meshestra_testing::fixtures::User;
use meshestra_testing::{TestingModule, init_tracing};
use meshestra_transactional::prelude::*;

trait Notifier: Send + Sync {
    fn channel(&self) -> &'static str;
}

#[derive(Injectable)]
struct SmtpNotifier;

impl Notifier for SmtpNotifier {
    fn channel(&self) -> &'static str {
        "smtp"
    }
}

#[module(
    providers = [SmtpNotifier],
    bindings = [(dyn Notifier => SmtpNotifier)],
)]
struct NotificationModule;

#[derive(Injectable)]
struct SignupService {
    module_ref: ModuleRef,
    notifier: Arc<dyn Notifier>,
    #[inject(repository = "User")]
    users: Repository<User>,
}

impl SignupService {
    async fn sign_up(&self, name: &str) -> anyhow::Result<&'static str> {
        self.users.save(User::new(name)).await?;
        Ok(self.notifier.channel())
    }
}

#[module(imports = [NotificationModule], providers = [SignupService])]
struct SignupModule;

#[tokio::test]
async fn test_rebinding_sees_providers_of_other_modules() -> anyhow::Result<()> {
    init_tracing();
    let module = TestingModule::builder()
        .entity::<User>()
        .import::<SignupModule>()
        .compile()
        .await?;
    let service = module.get::<SignupService>()?;

    let channel = module
        .data_source()
        .transaction(|manager| async move {
            service.with_transaction(&manager)?.sign_up("Aki").await
        })
        .await?;
    assert_eq!(channel, "smtp");
    assert!(
        module
            .data_source()
            .repository::<User>()
            .exists_by("name", "Aki")
            .await?
    );

    module.close().await;
    Ok(())
}

#[tokio::test]
async fn test_imported_modules_share_one_naming_scheme() -> anyhow::Result<()> {
    let module = TestingModule::builder()
        .import::<SignupModule>()
        .compile()
        .await?;

    let signup = module.container().module(type_name::<SignupModule>());
    assert!(signup.contains::<SignupService>());
    let notification = signup.module(type_name::<NotificationModule>());
    assert!(notification.contains::<SmtpNotifier>());

    module.close().await;
    Ok(())
}

#[tokio::test]
async fn test_strict_lookup_stays_in_the_service_module() -> anyhow::Result<()> {
    init_tracing();
    let module = TestingModule::builder()
        .entity::<User>()
        .import::<SignupModule>()
        .compile()
        .await?;
    let service = module.get::<SignupService>()?;

    // options registered at the root apply to every later rebinding
    module.container().register(RebindOptions {
        strict_lookup: true,
        ..RebindOptions::default()
    });

    let result = module
        .data_source()
        .transaction(|manager| async move {
            service.with_transaction(&manager)?;
            Ok::<_, anyhow::Error>(())
        })
        .await;
    let err = result.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<MeshestraError>(),
        Some(MeshestraError::DependencyNotFound { .. })
    ));

    module.close().await;
    Ok(())
}

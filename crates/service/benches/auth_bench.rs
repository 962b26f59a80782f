use criterion::{criterion_group, criterion_main, Criterion};
use std::sync::Arc;

use service::auth::domain::{LoginInput, RegisterInput, VerifyEmailInput};
use service::auth::repository::mock::MockAuthRepository;
use service::auth::service::{AuthConfig, AuthService};
use service::auth::verification::FixedCodeGenerator;
use service::clock::SystemClock;
use service::mail::LogMailer;

fn bench_login(c: &mut Criterion) {
    let repo = Arc::new(MockAuthRepository::default());
    let svc = AuthService::with_parts(
        repo,
        AuthConfig::for_tests(),
        Arc::new(SystemClock),
        Arc::new(LogMailer),
        Arc::new(FixedCodeGenerator::new(["123456"])),
    );

    // pre-create a verified user outside of the benchmark
    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async {
        svc.register(RegisterInput {
            username: Some("bench".into()),
            name: None,
            email: Some("bench@example.com".into()),
            password: Some("Bench!mark1".into()),
            confirm_password: Some("Bench!mark1".into()),
        })
        .await
        .unwrap();
        svc.verify_email(VerifyEmailInput { email: Some("bench@example.com".into()), code: Some("123456".into()) })
            .await
            .unwrap();
    });

    c.bench_function("auth_login_verify", |b| {
        b.iter(|| {
            let login = LoginInput { email: Some("bench@example.com".into()), password: Some("Bench!mark1".into()) };
            rt.block_on(svc.login(login)).unwrap();
        });
    });

    let token = rt
        .block_on(svc.login(LoginInput { email: Some("bench@example.com".into()), password: Some("Bench!mark1".into()) }))
        .unwrap()
        .access_token;
    c.bench_function("auth_authenticate_bearer", |b| {
        b.iter(|| {
            rt.block_on(svc.authenticate(&token)).unwrap();
        });
    });
}

criterion_group!(benches, bench_login);
criterion_main!(benches);

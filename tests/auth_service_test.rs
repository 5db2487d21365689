//! Integration tests for the authentication engine, run against the
//! in-memory store with a manual clock and scripted code source.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use mongodb::bson::DateTime;

use unitedcare_server::models::{
    AccountStatus, LoginDto, RegisterDto, ResetPasswordDto, Role,
    SubmitKycDto,
};
use unitedcare_server::services::auth::{AuthService, OTP_COOLDOWN_MS};
use unitedcare_server::services::clock::{Clock, CodeSource};
use unitedcare_server::services::error::AuthError;
use unitedcare_server::services::sms::Notifier;
use unitedcare_server::store::{AccountStore, MemoryStore, OtpLedger};

const BASE_MS: i64 = 1_700_000_000_000;
const PHONE: &str = "0712345678";
const PASSWORD: &str = "S3curePass!";

/// Clock pinned to a millisecond counter the test advances by hand.
struct ManualClock(Mutex<i64>);

impl ManualClock {
    fn new() -> Arc<Self> {
        Arc::new(ManualClock(Mutex::new(BASE_MS)))
    }

    fn advance(&self, ms: i64) {
        *self.0.lock().unwrap() += ms;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime {
        DateTime::from_millis(*self.0.lock().unwrap())
    }
}

/// Deterministic code source: 100001, 100002, ...
struct CountingCodes(Mutex<u32>);

impl CountingCodes {
    fn new() -> Arc<Self> {
        Arc::new(CountingCodes(Mutex::new(100_000)))
    }
}

impl CodeSource for CountingCodes {
    fn six_digits(&self) -> String {
        let mut next = self.0.lock().unwrap();
        *next += 1;
        format!("{:06}", *next)
    }
}

/// Captures dispatched messages; can be told to fail every send.
#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
    fail: AtomicBool,
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, phone: &str, message: &str) -> Result<(), String> {
        if self.fail.load(Ordering::SeqCst) {
            return Err("provider unavailable".to_string());
        }
        self.sent
            .lock()
            .unwrap()
            .push((phone.to_string(), message.to_string()));
        Ok(())
    }
}

impl RecordingNotifier {
    /// Six-digit code embedded in the most recent message.
    fn last_code(&self) -> String {
        let sent = self.sent.lock().unwrap();
        let (_, message) = sent.last().expect("no SMS sent");
        message
            .split_whitespace()
            .find(|w| {
                let w = w.trim_end_matches('.');
                w.len() == 6 && w.chars().all(|c| c.is_ascii_digit())
            })
            .map(|w| w.trim_end_matches('.').to_string())
            .expect("no code in message")
    }
}

struct TestCtx {
    svc: AuthService<MemoryStore, MemoryStore, MemoryStore>,
    store: MemoryStore,
    clock: Arc<ManualClock>,
    notifier: Arc<RecordingNotifier>,
}

fn setup() -> TestCtx {
    let store = MemoryStore::new();
    let clock = ManualClock::new();
    let notifier = Arc::new(RecordingNotifier::default());
    let svc = AuthService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        notifier.clone(),
        clock.clone(),
        CountingCodes::new(),
    );
    TestCtx {
        svc,
        store,
        clock,
        notifier,
    }
}

fn register_dto() -> RegisterDto {
    RegisterDto {
        username: "Wanjiku".into(),
        phone: PHONE.into(),
        id_number: Some("12345678".into()),
        password: PASSWORD.into(),
        role: None,
    }
}

fn login_dto(password: &str) -> LoginDto {
    LoginDto {
        phone: PHONE.into(),
        password: password.into(),
    }
}

/// Register and activate in one go; returns the activation code used.
async fn register_and_activate(ctx: &TestCtx) -> String {
    ctx.svc.register(register_dto()).await.unwrap();
    let code = ctx.notifier.last_code();
    ctx.svc.verify_otp(PHONE, &code).await.unwrap();
    code
}

// -----------------------------------------------------------------------
// Registration
// -----------------------------------------------------------------------

#[tokio::test]
async fn registration_creates_inactive_account_with_one_otp() {
    let ctx = setup();
    let user = ctx.svc.register(register_dto()).await.unwrap();

    assert!(!user.is_active);
    assert_eq!(user.status, AccountStatus::Pending);
    assert_eq!(user.role, Role::Member);

    let issued = ctx
        .store
        .count_since(PHONE, DateTime::from_millis(0))
        .await
        .unwrap();
    assert_eq!(issued, 1);

    // SMS went to the international form of the number.
    let sent = ctx.notifier.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "+254712345678");
    assert!(sent[0].1.contains("verification code"));
}

#[tokio::test]
async fn registration_reports_every_violated_field() {
    let ctx = setup();
    let err = ctx
        .svc
        .register(RegisterDto {
            username: "user99".into(),
            phone: "99999".into(),
            id_number: None,
            password: "123".into(),
            role: None,
        })
        .await
        .unwrap_err();

    match err {
        AuthError::Validation(violations) => {
            let fields: Vec<_> = violations.iter().map(|v| v.field).collect();
            assert!(fields.contains(&"username"));
            assert!(fields.contains(&"phone"));
            assert!(fields.contains(&"id_number"));
            assert!(fields.contains(&"password"));
        }
        other => panic!("expected Validation, got {other:?}"),
    }
}

#[tokio::test]
async fn duplicate_phone_is_a_conflict() {
    let ctx = setup();
    ctx.svc.register(register_dto()).await.unwrap();

    let mut dto = register_dto();
    dto.username = "Njeri".into();
    dto.id_number = Some("87654321".into());
    let err = ctx.svc.register(dto).await.unwrap_err();
    assert!(matches!(err, AuthError::Conflict { field: "phone" }));
}

#[tokio::test]
async fn sms_failure_does_not_fail_registration() {
    let ctx = setup();
    ctx.notifier.fail.store(true, Ordering::SeqCst);

    ctx.svc.register(register_dto()).await.unwrap();

    // Code was still recorded in the ledger.
    let issued = ctx
        .store
        .count_since(PHONE, DateTime::from_millis(0))
        .await
        .unwrap();
    assert_eq!(issued, 1);
}

// -----------------------------------------------------------------------
// OTP verification
// -----------------------------------------------------------------------

#[tokio::test]
async fn verify_activates_account_and_consumes_code() {
    let ctx = setup();
    ctx.svc.register(register_dto()).await.unwrap();
    let code = ctx.notifier.last_code();

    ctx.svc.verify_otp(PHONE, &code).await.unwrap();

    let user = ctx.store.find_by_phone(PHONE).await.unwrap().unwrap();
    assert!(user.is_active);

    // Same code again: consumed, indistinguishable from a wrong code.
    let err = ctx.svc.verify_otp(PHONE, &code).await.unwrap_err();
    assert!(matches!(err, AuthError::NotFound(_)));
}

#[tokio::test]
async fn wrong_code_and_unknown_phone_share_a_message() {
    let ctx = setup();
    ctx.svc.register(register_dto()).await.unwrap();

    let wrong_code = ctx.svc.verify_otp(PHONE, "000000").await.unwrap_err();
    let unknown_phone = ctx
        .svc
        .verify_otp("0700000000", "000000")
        .await
        .unwrap_err();
    assert_eq!(wrong_code.to_string(), unknown_phone.to_string());
}

#[tokio::test]
async fn code_is_valid_just_under_five_minutes() {
    let ctx = setup();
    ctx.svc.register(register_dto()).await.unwrap();
    let code = ctx.notifier.last_code();

    ctx.clock.advance(5 * 60_000 - 1_000); // 4:59
    ctx.svc.verify_otp(PHONE, &code).await.unwrap();
}

#[tokio::test]
async fn code_expires_at_five_minutes_sharp() {
    let ctx = setup();
    ctx.svc.register(register_dto()).await.unwrap();
    let code = ctx.notifier.last_code();

    ctx.clock.advance(5 * 60_000); // 5:00
    let err = ctx.svc.verify_otp(PHONE, &code).await.unwrap_err();
    assert!(matches!(err, AuthError::OtpExpired));

    // The record is left unused, not burned.
    let otp = ctx.store.find_valid(PHONE, &code).await.unwrap();
    assert!(otp.is_some());
}

// -----------------------------------------------------------------------
// Login and lockout
// -----------------------------------------------------------------------

#[tokio::test]
async fn login_issues_tokens_for_verified_account() {
    let ctx = setup();
    register_and_activate(&ctx).await;

    let out = ctx.svc.login(login_dto(PASSWORD)).await.unwrap();
    assert!(!out.tokens.access_token.is_empty());
    assert!(!out.tokens.refresh_token.is_empty());
    assert_eq!(out.role, Role::Member);
    assert_eq!(out.status, AccountStatus::Pending);
}

#[tokio::test]
async fn login_requires_activation() {
    let ctx = setup();
    ctx.svc.register(register_dto()).await.unwrap();

    let err = ctx.svc.login(login_dto(PASSWORD)).await.unwrap_err();
    assert!(matches!(err, AuthError::NotActivated));
}

#[tokio::test]
async fn blocked_account_is_refused_regardless_of_credentials() {
    let ctx = setup();
    register_and_activate(&ctx).await;
    ctx.store
        .modify_user(PHONE, |u| u.status = AccountStatus::Blocked);

    let err = ctx.svc.login(login_dto(PASSWORD)).await.unwrap_err();
    assert!(matches!(err, AuthError::Blocked));
}

#[tokio::test]
async fn unknown_phone_looks_like_wrong_password() {
    let ctx = setup();
    let err = ctx.svc.login(login_dto(PASSWORD)).await.unwrap_err();
    match err {
        AuthError::NotFound(message) => assert_eq!(message, "Invalid phone or password"),
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn fifth_failure_locks_for_fifteen_minutes_and_resets_counter() {
    let ctx = setup();
    register_and_activate(&ctx).await;

    for expected_remaining in (1..=4).rev() {
        let err = ctx.svc.login(login_dto("wrong-pass")).await.unwrap_err();
        match err {
            AuthError::InvalidCredentials { remaining } => {
                assert_eq!(remaining, expected_remaining)
            }
            other => panic!("expected InvalidCredentials, got {other:?}"),
        }
    }

    // Account is still open after four failures.
    let user = ctx.store.find_by_phone(PHONE).await.unwrap().unwrap();
    assert!(user.locked_until.is_none());
    assert_eq!(user.failed_login_attempts, 4);

    // Fifth failure trips the lock.
    let err = ctx.svc.login(login_dto("wrong-pass")).await.unwrap_err();
    assert!(matches!(err, AuthError::Locked { minutes: 15 }));

    let user = ctx.store.find_by_phone(PHONE).await.unwrap().unwrap();
    assert!(user.locked_until.is_some());
    assert_eq!(user.failed_login_attempts, 0);
}

#[tokio::test]
async fn lock_reports_ceiling_minutes_and_expires() {
    let ctx = setup();
    register_and_activate(&ctx).await;

    for _ in 0..5 {
        let _ = ctx.svc.login(login_dto("wrong-pass")).await;
    }

    // Correct credentials are irrelevant while locked.
    let err = ctx.svc.login(login_dto(PASSWORD)).await.unwrap_err();
    assert!(matches!(err, AuthError::Locked { minutes: 15 }));

    // 7 minutes in: 8 whole minutes remain.
    ctx.clock.advance(7 * 60_000);
    let err = ctx.svc.login(login_dto(PASSWORD)).await.unwrap_err();
    assert!(matches!(err, AuthError::Locked { minutes: 8 }));

    // 14:30 in: rounded up to 1.
    ctx.clock.advance(7 * 60_000 + 30_000);
    let err = ctx.svc.login(login_dto(PASSWORD)).await.unwrap_err();
    assert!(matches!(err, AuthError::Locked { minutes: 1 }));

    // At expiry the login goes straight through.
    ctx.clock.advance(30_000);
    let out = ctx.svc.login(login_dto(PASSWORD)).await.unwrap();
    assert!(!out.tokens.access_token.is_empty());

    let user = ctx.store.find_by_phone(PHONE).await.unwrap().unwrap();
    assert!(user.locked_until.is_none());
    assert_eq!(user.failed_login_attempts, 0);
}

#[tokio::test]
async fn successful_login_resets_failure_count() {
    let ctx = setup();
    register_and_activate(&ctx).await;

    for _ in 0..3 {
        let _ = ctx.svc.login(login_dto("wrong-pass")).await;
    }
    ctx.svc.login(login_dto(PASSWORD)).await.unwrap();

    let user = ctx.store.find_by_phone(PHONE).await.unwrap().unwrap();
    assert_eq!(user.failed_login_attempts, 0);

    // The slate really is clean: four more failures don't lock.
    for _ in 0..4 {
        let _ = ctx.svc.login(login_dto("wrong-pass")).await;
    }
    let user = ctx.store.find_by_phone(PHONE).await.unwrap().unwrap();
    assert!(user.locked_until.is_none());
}

// -----------------------------------------------------------------------
// Password reset
// -----------------------------------------------------------------------

#[tokio::test]
async fn reset_request_enforces_cooldown() {
    let ctx = setup();
    // Registration issued an OTP just now.
    ctx.svc.register(register_dto()).await.unwrap();

    ctx.clock.advance(30_000);
    let err = ctx.svc.request_password_reset(PHONE).await.unwrap_err();
    assert!(matches!(err, AuthError::RateLimited));

    ctx.clock.advance(OTP_COOLDOWN_MS - 30_000);
    ctx.svc.request_password_reset(PHONE).await.unwrap();
}

#[tokio::test]
async fn reset_request_enforces_hourly_cap() {
    let ctx = setup();
    ctx.svc.register(register_dto()).await.unwrap(); // OTP #1

    for _ in 0..4 {
        ctx.clock.advance(61_000);
        ctx.svc.request_password_reset(PHONE).await.unwrap(); // OTPs #2-#5
    }

    // Sixth within the trailing hour, cooldown long since satisfied.
    ctx.clock.advance(10 * 60_000);
    let err = ctx.svc.request_password_reset(PHONE).await.unwrap_err();
    assert!(matches!(err, AuthError::RateLimited));

    // Once the first issue leaves the trailing window, requests resume.
    ctx.clock.advance(60 * 60_000);
    ctx.svc.request_password_reset(PHONE).await.unwrap();
}

#[tokio::test]
async fn reset_request_for_unknown_phone_fails() {
    let ctx = setup();
    let err = ctx
        .svc
        .request_password_reset("0799999999")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::NotFound(_)));
}

#[tokio::test]
async fn reset_replaces_password_activates_and_burns_the_code() {
    let ctx = setup();
    // Never verified — reset must activate on its own.
    ctx.svc.register(register_dto()).await.unwrap();

    ctx.clock.advance(61_000);
    ctx.svc.request_password_reset(PHONE).await.unwrap();
    let code = ctx.notifier.last_code();

    let out = ctx
        .svc
        .reset_password(ResetPasswordDto {
            phone: PHONE.into(),
            otp: code.clone(),
            new_password: "N3wSecret!".into(),
        })
        .await
        .unwrap();
    assert!(!out.tokens.access_token.is_empty());

    // Old password is dead, new one works, account is active.
    let err = ctx.svc.login(login_dto(PASSWORD)).await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials { .. }));
    ctx.svc.login(login_dto("N3wSecret!")).await.unwrap();

    // The OTP cannot be replayed.
    let err = ctx
        .svc
        .reset_password(ResetPasswordDto {
            phone: PHONE.into(),
            otp: code,
            new_password: "An0therOne!".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::NotFound(_)));
}

#[tokio::test]
async fn reset_rejects_expired_code_and_weak_password() {
    let ctx = setup();
    ctx.svc.register(register_dto()).await.unwrap();
    ctx.clock.advance(61_000);
    ctx.svc.request_password_reset(PHONE).await.unwrap();
    let code = ctx.notifier.last_code();

    let err = ctx
        .svc
        .reset_password(ResetPasswordDto {
            phone: PHONE.into(),
            otp: code.clone(),
            new_password: "1234".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Validation(_)));

    ctx.clock.advance(5 * 60_000);
    let err = ctx
        .svc
        .reset_password(ResetPasswordDto {
            phone: PHONE.into(),
            otp: code,
            new_password: "N3wSecret!".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::OtpExpired));
}

// -----------------------------------------------------------------------
// Token refresh
// -----------------------------------------------------------------------

#[tokio::test]
async fn refresh_mints_a_new_access_token() {
    let ctx = setup();
    register_and_activate(&ctx).await;
    let out = ctx.svc.login(login_dto(PASSWORD)).await.unwrap();

    let access = ctx
        .svc
        .refresh_access_token(&out.tokens.refresh_token)
        .await
        .unwrap();
    assert!(!access.is_empty());

    // An access token is not accepted as a refresh token.
    let err = ctx
        .svc
        .refresh_access_token(&out.tokens.access_token)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::NotFound(_)));
}

#[tokio::test]
async fn refresh_rechecks_account_gates() {
    let ctx = setup();
    register_and_activate(&ctx).await;
    let out = ctx.svc.login(login_dto(PASSWORD)).await.unwrap();

    ctx.store
        .modify_user(PHONE, |u| u.status = AccountStatus::Blocked);
    let err = ctx
        .svc
        .refresh_access_token(&out.tokens.refresh_token)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Blocked));
}

// -----------------------------------------------------------------------
// KYC intake
// -----------------------------------------------------------------------

#[tokio::test]
async fn kyc_resubmission_overwrites_the_single_record() {
    let ctx = setup();
    register_and_activate(&ctx).await;
    let user = ctx.store.find_by_phone(PHONE).await.unwrap().unwrap();
    let user_id = user.id.unwrap();

    ctx.svc
        .submit_kyc(
            user_id,
            SubmitKycDto {
                passport_photo: "kyc/passport/a.jpg".into(),
                id_front: "kyc/id_front/a.jpg".into(),
                id_back: "kyc/id_back/a.jpg".into(),
            },
        )
        .await
        .unwrap();
    let first = ctx.svc.kyc_status(user_id).await.unwrap().unwrap();

    ctx.clock.advance(60_000);
    ctx.svc
        .submit_kyc(
            user_id,
            SubmitKycDto {
                passport_photo: "kyc/passport/b.jpg".into(),
                id_front: "kyc/id_front/b.jpg".into(),
                id_back: "kyc/id_back/b.jpg".into(),
            },
        )
        .await
        .unwrap();

    let second = ctx.svc.kyc_status(user_id).await.unwrap().unwrap();
    assert_eq!(second.id, first.id); // same record, overwritten
    assert_eq!(
        second.status,
        unitedcare_server::models::KycStatus::Submitted
    );
    assert_eq!(second.documents.passport_photo, "kyc/passport/b.jpg");
    assert!(second.submitted_at.timestamp_millis() > first.submitted_at.timestamp_millis());
}

// -----------------------------------------------------------------------
// Concurrent access
// -----------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_verifications_consume_the_code_exactly_once() {
    let ctx = setup();
    ctx.svc.register(register_dto()).await.unwrap();
    let code = ctx.notifier.last_code();

    let svc = Arc::new(ctx.svc);
    let mut handles = Vec::new();
    for _ in 0..8 {
        let svc = svc.clone();
        let code = code.clone();
        handles.push(tokio::spawn(
            async move { svc.verify_otp(PHONE, &code).await },
        ));
    }

    let mut activations = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => activations += 1,
            Err(AuthError::NotFound(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(activations, 1);

    let user = ctx.store.find_by_phone(PHONE).await.unwrap().unwrap();
    assert!(user.is_active);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_failed_logins_each_observe_a_distinct_count() {
    let ctx = setup();
    register_and_activate(&ctx).await;

    let svc = Arc::new(ctx.svc);
    let mut handles = Vec::new();
    for _ in 0..4 {
        let svc = svc.clone();
        handles.push(tokio::spawn(async move {
            svc.login(login_dto("wrong-pass")).await
        }));
    }

    let mut remaining = Vec::new();
    for handle in handles {
        match handle.await.unwrap() {
            Err(AuthError::InvalidCredentials { remaining: left }) => remaining.push(left),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    // No lost counter updates: the four racers see four different counts.
    remaining.sort_unstable();
    assert_eq!(remaining, vec![1, 2, 3, 4]);

    let user = ctx.store.find_by_phone(PHONE).await.unwrap().unwrap();
    assert_eq!(user.failed_login_attempts, 4);
}

#[tokio::test]
async fn kyc_for_unknown_identity_fails() {
    let ctx = setup();
    let err = ctx
        .svc
        .submit_kyc(
            mongodb::bson::oid::ObjectId::new(),
            SubmitKycDto {
                passport_photo: "p".into(),
                id_front: "f".into(),
                id_back: "b".into(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::NotFound(_)));
}

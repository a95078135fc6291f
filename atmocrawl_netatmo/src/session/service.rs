use std::{
    sync::atomic::{AtomicBool, AtomicU64, Ordering},
    time::Duration,
};

use atmocrawl_core::Timestamp;
use tokio::{sync::Mutex as AsyncMutex, time::sleep};

use super::types::{FailureKind, RetryPolicy, Session};
use crate::{
    NetatmoError, NetatmoResult,
    client::{AuthApi, TokenGrant},
};

const DEFAULT_REFRESH_SKEW: Duration = Duration::from_secs(60);

pub trait Clock {
    fn now(&self) -> Timestamp;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// Result of asking the session for a token to call the API with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenAccess {
    Ready(String),
    /// A reinitialization is sleeping through its cooldown; callers must not
    /// issue requests until it finishes.
    Declined,
}

#[derive(Debug, Default)]
struct SessionState {
    session: Option<Session>,
    failed_attempts: u32,
}

/// Owner of the single Netatmo session of the process.
///
/// Every login and refresh runs while holding the state lock, so at most one
/// session rebuild is in flight. The in-progress flag is raised for the
/// duration of a retry cooldown and makes [`SessionManager::access_token`]
/// decline instead of waiting on the rebuild.
pub struct SessionManager<C, T = SystemClock>
where
    C: AuthApi,
    T: Clock,
{
    client: C,
    clock: T,
    policy: RetryPolicy,
    refresh_skew: Duration,
    state: AsyncMutex<SessionState>,
    reinit_in_progress: AtomicBool,
    /// Bumped by every successful login.
    session_generation: AtomicU64,
}

impl<C> SessionManager<C, SystemClock>
where
    C: AuthApi + Send + Sync,
{
    pub fn new(client: C, policy: RetryPolicy) -> Self {
        Self::with_clock(client, policy, SystemClock)
    }
}

impl<C, T> SessionManager<C, T>
where
    C: AuthApi + Send + Sync,
    T: Clock + Send + Sync,
{
    pub fn with_clock(client: C, policy: RetryPolicy, clock: T) -> Self {
        Self {
            client,
            clock,
            policy,
            refresh_skew: DEFAULT_REFRESH_SKEW,
            state: AsyncMutex::new(SessionState::default()),
            reinit_in_progress: AtomicBool::new(false),
            session_generation: AtomicU64::new(0),
        }
    }

    pub fn with_refresh_skew(mut self, refresh_skew: Duration) -> Self {
        self.refresh_skew = refresh_skew;
        self
    }

    pub fn reinit_in_progress(&self) -> bool {
        self.reinit_in_progress.load(Ordering::SeqCst)
    }

    pub async fn failed_attempts(&self) -> u32 {
        self.state.lock().await.failed_attempts
    }

    pub async fn access_expires_at(&self) -> Option<Timestamp> {
        self.state
            .lock()
            .await
            .session
            .as_ref()
            .map(|session| session.access_expires_at)
    }

    /// Creates the session at startup.
    pub async fn start(&self) -> NetatmoResult<()> {
        log::info!("initializing netatmo session");
        self.authenticate(false).await
    }

    /// Fresh login exchange. Unless `force` is set, declines when a
    /// reinitialization is already in progress and skips when another login
    /// completed while this call waited for the session lock.
    pub async fn authenticate(&self, force: bool) -> NetatmoResult<()> {
        if !force && self.reinit_in_progress() {
            log::warn!("session reinitialization already in progress; authenticate declined");
            return Ok(());
        }

        let generation = self.session_generation.load(Ordering::SeqCst);
        let mut state = self.state.lock().await;
        if !force && self.session_generation.load(Ordering::SeqCst) != generation {
            log::debug!("netatmo session was rebuilt while waiting; authenticate skipped");
            return Ok(());
        }
        self.authenticate_locked(&mut state).await
    }

    /// Exchanges the refresh token for a new access token, or logs in when no
    /// session exists yet.
    pub async fn refresh(&self) -> NetatmoResult<()> {
        let mut state = self.state.lock().await;
        self.refresh_locked(&mut state).await
    }

    pub async fn handle_failure(&self, failure: FailureKind) -> NetatmoResult<()> {
        if failure.requires_reauthentication() {
            log::info!("handling {failure} by reinitializing the netatmo session");
            return self.authenticate(false).await;
        }

        if matches!(failure, FailureKind::Unexpected(_)) {
            log::error!("handling {failure} by refreshing the netatmo session");
        } else {
            log::info!("handling {failure} by refreshing the netatmo session");
        }
        self.refresh().await
    }

    /// Hands out the current access token, refreshing it first when it is
    /// about to expire.
    pub async fn access_token(&self) -> NetatmoResult<TokenAccess> {
        if self.reinit_in_progress() {
            return Ok(TokenAccess::Declined);
        }

        let mut state = self.state.lock().await;
        let now = self.clock.now();
        let refresh_due = match state.session.as_ref() {
            None => {
                log::info!("no netatmo session available; authenticating");
                self.authenticate_locked(&mut state).await?;
                false
            }
            Some(session) => session.should_refresh(now, self.refresh_skew),
        };

        if refresh_due {
            log::debug!("netatmo access token expires soon; refreshing");
            self.refresh_locked(&mut state).await?;
        }

        match state.session.as_ref() {
            Some(session) => Ok(TokenAccess::Ready(session.access_token.clone())),
            None => Err(NetatmoError::message(
                "netatmo session missing after successful authentication",
            )),
        }
    }

    async fn authenticate_locked(&self, state: &mut SessionState) -> NetatmoResult<()> {
        match self.login(state).await {
            Ok(()) => Ok(()),
            Err(err) => {
                log::warn!(
                    "netatmo session initialization failed: {}",
                    err.display_chain()
                );
                self.retry_login(state).await
            }
        }
    }

    async fn refresh_locked(&self, state: &mut SessionState) -> NetatmoResult<()> {
        let Some(refresh_token) = state
            .session
            .as_ref()
            .map(|session| session.refresh_token.clone())
        else {
            log::info!("no netatmo session to refresh; authenticating");
            return self.authenticate_locked(state).await;
        };

        let refreshed = match self.client.refresh_token(&refresh_token).await {
            Ok(grant) => self.session_from_grant(grant),
            Err(err) => Err(err),
        };

        match refreshed {
            Ok(session) => {
                log::debug!(
                    "netatmo access token refreshed, valid until {}",
                    session.access_expires_at
                );
                state.session = Some(session);
                Ok(())
            }
            Err(err) => {
                log::warn!("netatmo session refresh failed: {}", err.display_chain());
                self.retry_login(state).await
            }
        }
    }

    /// Counts the failure that led here, then keeps logging in with a
    /// cooldown in between until a login succeeds or the ceiling is passed.
    async fn retry_login(&self, state: &mut SessionState) -> NetatmoResult<()> {
        loop {
            state.failed_attempts = state.failed_attempts.saturating_add(1);
            if state.failed_attempts > self.policy.max_failed_registrations {
                self.reinit_in_progress.store(false, Ordering::SeqCst);
                log::error!(
                    "(re)initializing the netatmo session failed {} times; giving up",
                    state.failed_attempts
                );
                return Err(NetatmoError::RetriesExhausted {
                    attempts: state.failed_attempts,
                });
            }

            log::debug!(
                "locking session reinitialization for {:?} (failed attempts: {})",
                self.policy.delay,
                state.failed_attempts
            );
            self.reinit_in_progress.store(true, Ordering::SeqCst);
            sleep(self.policy.delay).await;

            match self.login(state).await {
                Ok(()) => {
                    log::info!("netatmo session reinitialized");
                    return Ok(());
                }
                Err(err) => log::warn!(
                    "netatmo session reinitialization failed: {}",
                    err.display_chain()
                ),
            }
        }
    }

    async fn login(&self, state: &mut SessionState) -> NetatmoResult<()> {
        let grant = self.client.request_token().await?;
        let session = self.session_from_grant(grant)?;
        log::debug!(
            "netatmo session established, valid until {}",
            session.access_expires_at
        );

        state.session = Some(session);
        state.failed_attempts = 0;
        self.session_generation.fetch_add(1, Ordering::SeqCst);
        self.reinit_in_progress.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn session_from_grant(&self, grant: TokenGrant) -> NetatmoResult<Session> {
        let now = self.clock.now();
        let access_expires_at = now.checked_add(grant.expires_in).ok_or(
            NetatmoError::TokenExpiryOverflow {
                expires_in_secs: grant.expires_in.as_secs(),
            },
        )?;

        Ok(Session {
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
            access_expires_at,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{
        collections::VecDeque,
        sync::{
            Arc, Mutex,
            atomic::{AtomicU32, Ordering},
        },
        time::Duration,
    };

    use async_trait::async_trait;
    use atmocrawl_core::Timestamp;
    use tokio::sync::Semaphore;

    use super::{Clock, SessionManager, TokenAccess};
    use crate::{
        NetatmoError, NetatmoResult,
        client::{AuthApi, TokenGrant},
        session::{FailureKind, RetryPolicy},
    };

    #[derive(Clone, Copy)]
    pub(crate) struct FixedClock {
        pub(crate) now: Timestamp,
    }

    impl Clock for FixedClock {
        fn now(&self) -> Timestamp {
            self.now
        }
    }

    /// Scripted token endpoint. An empty script answers with a valid grant.
    #[derive(Default)]
    pub(crate) struct ScriptedAuth {
        pub(crate) logins: Mutex<VecDeque<NetatmoResult<TokenGrant>>>,
        pub(crate) refreshes: Mutex<VecDeque<NetatmoResult<TokenGrant>>>,
        pub(crate) login_calls: AtomicU32,
        pub(crate) refresh_calls: AtomicU32,
    }

    impl ScriptedAuth {
        pub(crate) fn with_logins(logins: Vec<NetatmoResult<TokenGrant>>) -> Self {
            Self {
                logins: Mutex::new(VecDeque::from(logins)),
                ..Self::default()
            }
        }

        pub(crate) fn login_calls(&self) -> u32 {
            self.login_calls.load(Ordering::SeqCst)
        }

        pub(crate) fn refresh_calls(&self) -> u32 {
            self.refresh_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AuthApi for Arc<ScriptedAuth> {
        async fn request_token(&self) -> NetatmoResult<TokenGrant> {
            let call = self.login_calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.logins
                .lock()
                .expect("logins lock")
                .pop_front()
                .unwrap_or_else(|| Ok(grant(&format!("login-{call}"), 10_800)))
        }

        async fn refresh_token(&self, _refresh_token: &str) -> NetatmoResult<TokenGrant> {
            let call = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.refreshes
                .lock()
                .expect("refreshes lock")
                .pop_front()
                .unwrap_or_else(|| Ok(grant(&format!("refresh-{call}"), 10_800)))
        }
    }

    /// Token endpoint whose logins wait until the test opens the gate.
    struct GatedAuth {
        gate: Semaphore,
        login_calls: AtomicU32,
    }

    impl GatedAuth {
        fn closed() -> Self {
            Self {
                gate: Semaphore::new(0),
                login_calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl AuthApi for Arc<GatedAuth> {
        async fn request_token(&self) -> NetatmoResult<TokenGrant> {
            let call = self.login_calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.gate.acquire().await.expect("gate open").forget();
            Ok(grant(&format!("login-{call}"), 10_800))
        }

        async fn refresh_token(&self, _refresh_token: &str) -> NetatmoResult<TokenGrant> {
            Ok(grant("refresh", 10_800))
        }
    }

    pub(crate) fn grant(access_token: &str, expires_in_secs: u64) -> TokenGrant {
        TokenGrant {
            access_token: access_token.to_string(),
            refresh_token: format!("{access_token}-refresh"),
            expires_in: Duration::from_secs(expires_in_secs),
        }
    }

    pub(crate) fn rejected() -> NetatmoResult<TokenGrant> {
        Err(NetatmoError::TokenRejected {
            status: 400,
            body: "{\"error\":\"invalid_grant\"}".to_string(),
        })
    }

    pub(crate) fn policy(max_failed_registrations: u32, delay: Duration) -> RetryPolicy {
        RetryPolicy {
            max_failed_registrations,
            delay,
        }
    }

    fn manager(
        auth: &Arc<ScriptedAuth>,
        max_failed_registrations: u32,
    ) -> SessionManager<Arc<ScriptedAuth>, FixedClock> {
        SessionManager::with_clock(
            Arc::clone(auth),
            policy(max_failed_registrations, Duration::ZERO),
            FixedClock { now: ts(1_700_000_000) },
        )
    }

    #[tokio::test]
    async fn start_establishes_session() {
        let auth = Arc::new(ScriptedAuth::default());
        let manager = manager(&auth, 3);

        manager.start().await.expect("start should succeed");

        assert_eq!(auth.login_calls(), 1);
        assert_eq!(
            manager.access_token().await.expect("token"),
            TokenAccess::Ready("login-1".to_string())
        );
        assert_eq!(
            manager.access_expires_at().await,
            Some(ts(1_700_010_800))
        );
    }

    #[tokio::test]
    async fn recovers_when_failures_stay_within_ceiling() {
        let auth = Arc::new(ScriptedAuth::with_logins(vec![
            rejected(),
            rejected(),
            rejected(),
            Ok(grant("fourth", 10_800)),
        ]));
        let manager = manager(&auth, 3);

        manager.start().await.expect("should recover after 3 failures");

        assert_eq!(auth.login_calls(), 4);
        assert_eq!(manager.failed_attempts().await, 0);
        assert!(!manager.reinit_in_progress());
        assert_eq!(
            manager.access_token().await.expect("token"),
            TokenAccess::Ready("fourth".to_string())
        );
    }

    #[tokio::test]
    async fn exhausts_after_ceiling_plus_one_attempts() {
        let auth = Arc::new(ScriptedAuth::with_logins(
            (0..10).map(|_| rejected()).collect(),
        ));
        let manager = manager(&auth, 2);

        let err = manager.start().await.expect_err("should exhaust retries");

        assert!(matches!(err, NetatmoError::RetriesExhausted { attempts: 3 }));
        assert_eq!(auth.login_calls(), 3);
        assert!(!manager.reinit_in_progress());
    }

    #[tokio::test]
    async fn zero_ceiling_allows_a_single_attempt() {
        let auth = Arc::new(ScriptedAuth::with_logins(vec![rejected()]));
        let manager = manager(&auth, 0);

        let err = manager.start().await.expect_err("should exhaust retries");

        assert!(matches!(err, NetatmoError::RetriesExhausted { attempts: 1 }));
        assert_eq!(auth.login_calls(), 1);
    }

    #[tokio::test]
    async fn refresh_without_session_authenticates() {
        let auth = Arc::new(ScriptedAuth::default());
        let manager = manager(&auth, 1);

        manager.refresh().await.expect("refresh should log in");

        assert_eq!(auth.login_calls(), 1);
        assert_eq!(auth.refresh_calls(), 0);
    }

    #[tokio::test]
    async fn refresh_failure_shares_the_attempt_counter_with_login() {
        let auth = Arc::new(ScriptedAuth::default());
        auth.refreshes.lock().expect("refreshes lock").push_back(rejected());
        let manager = manager(&auth, 1);
        manager.start().await.expect("start");
        auth.logins
            .lock()
            .expect("logins lock")
            .extend([rejected(), rejected()]);

        let err = manager.refresh().await.expect_err("refresh then one login retry");

        // refresh failure counts as 1, the retried login as 2 > ceiling of 1
        assert!(matches!(err, NetatmoError::RetriesExhausted { attempts: 2 }));
        assert_eq!(auth.refresh_calls(), 1);
        assert_eq!(auth.login_calls(), 2);
    }

    #[tokio::test]
    async fn failed_refresh_falls_back_to_fresh_login() {
        let auth = Arc::new(ScriptedAuth::default());
        auth.refreshes.lock().expect("refreshes lock").push_back(rejected());
        let manager = manager(&auth, 3);
        manager.start().await.expect("start");

        manager.refresh().await.expect("fallback login should succeed");

        assert_eq!(auth.refresh_calls(), 1);
        assert_eq!(auth.login_calls(), 2);
        assert_eq!(manager.failed_attempts().await, 0);
        assert_eq!(
            manager.access_token().await.expect("token"),
            TokenAccess::Ready("login-2".to_string())
        );
    }

    #[tokio::test]
    async fn unauthorized_reauthenticates_instead_of_refreshing() {
        let auth = Arc::new(ScriptedAuth::default());
        let manager = manager(&auth, 3);
        manager.start().await.expect("start");

        manager
            .handle_failure(FailureKind::Unauthorized)
            .await
            .expect("recovery");

        assert_eq!(auth.login_calls(), 2);
        assert_eq!(auth.refresh_calls(), 0);
    }

    #[tokio::test]
    async fn other_failures_refresh_instead_of_reauthenticating() {
        let auth = Arc::new(ScriptedAuth::default());
        let manager = manager(&auth, 3);
        manager.start().await.expect("start");

        for failure in [
            FailureKind::Forbidden,
            FailureKind::Unexpected(500),
            FailureKind::ConnectionError,
            FailureKind::Timeout,
        ] {
            manager.handle_failure(failure).await.expect("recovery");
        }

        assert_eq!(auth.login_calls(), 1);
        assert_eq!(auth.refresh_calls(), 4);
        assert_eq!(
            manager.access_token().await.expect("token"),
            TokenAccess::Ready("refresh-4".to_string())
        );
    }

    #[tokio::test]
    async fn access_token_refreshes_expiring_session() {
        let auth = Arc::new(ScriptedAuth::with_logins(vec![Ok(grant("short", 30))]));
        let manager = manager(&auth, 3).with_refresh_skew(Duration::from_secs(60));
        manager.start().await.expect("start");

        let token = manager.access_token().await.expect("token");

        assert_eq!(token, TokenAccess::Ready("refresh-1".to_string()));
        assert_eq!(auth.refresh_calls(), 1);
    }

    #[tokio::test]
    async fn access_token_logs_in_when_never_started() {
        let auth = Arc::new(ScriptedAuth::default());
        let manager = manager(&auth, 3);

        let token = manager.access_token().await.expect("token");

        assert_eq!(token, TokenAccess::Ready("login-1".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn cooldown_declines_tokens_and_non_forced_logins() {
        let auth = Arc::new(ScriptedAuth::with_logins(vec![rejected()]));
        let manager = Arc::new(SessionManager::with_clock(
            Arc::clone(&auth),
            policy(3, Duration::from_secs(30)),
            FixedClock { now: ts(1_700_000_000) },
        ));

        let background = tokio::spawn({
            let manager = Arc::clone(&manager);
            async move { manager.start().await }
        });
        for _ in 0..10 {
            if manager.reinit_in_progress() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(manager.reinit_in_progress());

        assert_eq!(
            manager.access_token().await.expect("declined token"),
            TokenAccess::Declined
        );
        manager
            .authenticate(false)
            .await
            .expect("declined authenticate is not an error");
        assert_eq!(auth.login_calls(), 1);

        background
            .await
            .expect("join")
            .expect("retry after cooldown succeeds");
        assert_eq!(auth.login_calls(), 2);
        assert!(!manager.reinit_in_progress());
    }

    #[tokio::test]
    async fn waiting_authenticate_skips_after_concurrent_login() {
        let auth = Arc::new(GatedAuth::closed());
        let manager = SessionManager::with_clock(
            Arc::clone(&auth),
            policy(3, Duration::ZERO),
            FixedClock { now: ts(1_700_000_000) },
        );

        let (first, second, ()) = tokio::join!(
            manager.authenticate(false),
            manager.authenticate(false),
            async {
                tokio::task::yield_now().await;
                auth.gate.add_permits(2);
            }
        );
        first.expect("first login");
        second.expect("second call skipped");

        assert_eq!(auth.login_calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            manager.access_token().await.expect("token"),
            TokenAccess::Ready("login-1".to_string())
        );
    }

    #[tokio::test]
    async fn forced_authenticate_always_logs_in() {
        let auth = Arc::new(ScriptedAuth::default());
        let manager = manager(&auth, 3);
        manager.start().await.expect("start");

        manager.authenticate(true).await.expect("forced login");

        assert_eq!(auth.login_calls(), 2);
    }

    pub(crate) fn ts(epoch_secs: i64) -> Timestamp {
        Timestamp::from_epoch_secs(epoch_secs).expect("valid epoch seconds")
    }
}

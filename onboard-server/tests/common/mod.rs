//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use onboard_server::identity::{IdentityClient, IdentityError, IdentityResult};
use onboard_server::store::{
    Collection, Document, DocumentStore, Filter, MemoryStore, StoreError, StoreResult, Update,
};
use onboard_server::{OnboardingService, RecoveryConfig, RecoveryScanner};
use parking_lot::Mutex;
use shared::util::now_millis;
use shared::{ProvisioningFields, TenantApplication};
use tokio_util::sync::CancellationToken;

/// Identity service double with scripted failures and call counters
#[derive(Default)]
pub struct FakeIdentity {
    accounts: Mutex<HashSet<String>>,
    next_register_error: Mutex<Option<IdentityError>>,
    exists_error: Mutex<Option<IdentityError>>,
    revert_on_register: Mutex<Option<(OnboardingService, String)>>,
    pub register_calls: AtomicUsize,
    pub exists_calls: AtomicUsize,
}

impl FakeIdentity {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Next `register` call fails with `err` without creating an account
    pub fn fail_next_register(&self, err: IdentityError) {
        *self.next_register_error.lock() = Some(err);
    }

    /// Every `account_exists` call fails with `err`
    pub fn fail_exists(&self, err: IdentityError) {
        *self.exists_error.lock() = Some(err);
    }

    /// Revert `request_id` to `pending` while the next registration is in
    /// flight, as an operator retry racing the approval would
    pub fn revert_during_register(&self, service: OnboardingService, request_id: &str) {
        *self.revert_on_register.lock() = Some((service, request_id.to_string()));
    }

    /// Pretend an earlier call created the account
    pub fn add_account(&self, username: &str) {
        self.accounts.lock().insert(username.to_string());
    }

    pub fn has_account(&self, username: &str) -> bool {
        self.accounts.lock().contains(username)
    }

    pub fn registrations(&self) -> usize {
        self.register_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityClient for FakeIdentity {
    async fn register(&self, account: &ProvisioningFields) -> IdentityResult<String> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        let pending_revert = self.revert_on_register.lock().take();
        if let Some((service, request_id)) = pending_revert {
            service
                .revert_to_retriable(&request_id)
                .await
                .expect("revert during registration");
        }
        if let Some(err) = self.next_register_error.lock().take() {
            return Err(err);
        }
        if !self.accounts.lock().insert(account.username.clone()) {
            return Err(IdentityError::AlreadyExists(account.username.clone()));
        }
        Ok(format!("acct-{}", account.username))
    }

    async fn account_exists(&self, username: &str, _email: &str) -> IdentityResult<bool> {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.exists_error.lock().clone() {
            return Err(err);
        }
        Ok(self.accounts.lock().contains(username))
    }
}

/// `MemoryStore` wrapper that fails writes on demand
///
/// `update_one` failures start after `updates_before_failure` more calls
/// succeed, so a test can let `begin_approval` through and fail the next step.
#[derive(Default)]
pub struct FlakyStore {
    inner: Arc<MemoryStore>,
    fail_updates_after: Mutex<Option<usize>>,
    fail_creates: AtomicBool,
    fail_deletes: AtomicBool,
}

impl FlakyStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            ..Default::default()
        }
    }

    pub fn fail_updates_after(&self, successes: usize) {
        *self.fail_updates_after.lock() = Some(successes);
    }

    pub fn fail_creates(&self) {
        self.fail_creates.store(true, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self) {
        self.fail_deletes.store(true, Ordering::SeqCst);
    }

    /// Stop injecting failures
    pub fn heal(&self) {
        *self.fail_updates_after.lock() = None;
        self.fail_creates.store(false, Ordering::SeqCst);
        self.fail_deletes.store(false, Ordering::SeqCst);
    }

    fn injected(operation: &str) -> StoreError {
        StoreError::Database(format!("injected {operation} failure"))
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn create(&self, collection: Collection, document: Document) -> StoreResult<String> {
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(Self::injected("create"));
        }
        self.inner.create(collection, document).await
    }

    async fn read(&self, collection: Collection, filter: &Filter) -> StoreResult<Option<Document>> {
        self.inner.read(collection, filter).await
    }

    async fn read_all(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> StoreResult<Vec<Document>> {
        self.inner.read_all(collection, filter).await
    }

    async fn update_one(
        &self,
        collection: Collection,
        filter: &Filter,
        update: &Update,
    ) -> StoreResult<u64> {
        {
            let mut remaining = self.fail_updates_after.lock();
            match *remaining {
                Some(0) => return Err(Self::injected("update")),
                Some(ref mut n) => *n -= 1,
                None => {}
            }
        }
        self.inner.update_one(collection, filter, update).await
    }

    async fn delete(&self, collection: Collection, filter: &Filter) -> StoreResult<u64> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(Self::injected("delete"));
        }
        self.inner.delete(collection, filter).await
    }
}

pub struct Harness {
    /// Backing store; writes here bypass injected failures
    pub store: Arc<MemoryStore>,
    /// Store the service writes through
    pub flaky: Arc<FlakyStore>,
    pub identity: Arc<FakeIdentity>,
    pub service: OnboardingService,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let flaky = Arc::new(FlakyStore::new(store.clone()));
        let identity = FakeIdentity::new();
        let service = OnboardingService::new(flaky.clone());
        Self {
            store,
            flaky,
            identity,
            service,
        }
    }

    pub fn dyn_store(&self) -> Arc<dyn DocumentStore> {
        self.flaky.clone()
    }

    pub fn dyn_identity(&self) -> Arc<dyn IdentityClient> {
        self.identity.clone()
    }

    pub fn scanner(&self) -> RecoveryScanner {
        RecoveryScanner::new(
            self.service.clone(),
            self.dyn_identity(),
            RecoveryConfig::default(),
            CancellationToken::new(),
        )
    }

    pub async fn submit(&self, email: &str) -> String {
        self.service
            .onboard_tenant(application(email))
            .await
            .expect("submit application")
    }

    /// Push a timestamp field `age_ms` into the past
    pub async fn age(&self, request_id: &str, field: &'static str, age_ms: i64) {
        let modified = self
            .store
            .update_one(
                Collection::OnboardingRequests,
                &Filter::new().eq("request_id", request_id),
                &Update::new().set(field, now_millis() - age_ms),
            )
            .await
            .expect("age request");
        assert_eq!(modified, 1, "request {request_id} not found");
    }
}

pub fn application(email: &str) -> TenantApplication {
    TenantApplication {
        organization_name: "Acme Corp".into(),
        email: email.into(),
        role: "admin".into(),
        address: Some("1 Main St".into()),
        phone_number: Some("+1 555 0100".into()),
        business_identifier: Some("ACME-001".into()),
    }
}

pub const TEN_MINUTES_MS: i64 = 10 * 60 * 1000;

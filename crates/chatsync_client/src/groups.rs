//! Group, member and join-request synchronization.
//!
//! One [`SyncTarget`] per entity kind wires the generic reconciler to the
//! local store and the notifier. Member collections are fanned out through
//! the task pool, one full sync per group, gated by version-sync records so
//! an unchanged group costs one version probe instead of a page walk.

use crate::error::ClientResult;
use chatsync_engine::{
    Change, EngineResult, Notifier, Reconciler, SyncSummary, SyncTarget, TaskPool,
};
use chatsync_proto::{PageRequest, Paged};
use chatsync_store::{
    Group, GroupMember, GroupRequest, GroupStatus, GroupStore, HandleResult, ReadStore,
    StoreError, VersionRecord, VersionStore,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Version-sync table for per-group member collections.
const MEMBER_VERSION_TABLE: &str = "group_members";

/// Conversation identifier convention for a group chat.
fn group_conversation_id(group_id: &str) -> String {
    format!("sg_{group_id}")
}

/// Supplies server pages and version markers for each synced entity kind.
pub trait PageFetcher: Send + Sync {
    /// One page of the local user's joined groups.
    fn joined_groups(&self, request: &PageRequest) -> EngineResult<Paged<Group>>;

    /// One page of a group's members; the scope is the group identifier.
    fn group_members(&self, request: &PageRequest) -> EngineResult<Paged<GroupMember>>;

    /// One page of the local user's join requests.
    fn group_requests(&self, request: &PageRequest) -> EngineResult<Paged<GroupRequest>>;

    /// The server's current version marker for a group's member collection.
    fn member_version(&self, group_id: &str) -> EngineResult<String>;
}

/// Syncs the joined-group collection.
struct GroupTarget<S, F> {
    store: Arc<S>,
    fetcher: Arc<F>,
    notifier: Arc<Notifier>,
}

impl<S, F> GroupTarget<S, F>
where
    S: GroupStore + ReadStore + VersionStore,
{
    /// Propagates a persisted name or avatar change onto the group's
    /// conversation display fields.
    fn refresh_conversation(&self, group: &Group) {
        let conversation_id = group_conversation_id(&group.group_id);
        let mut conversation = match self.store.conversation(&conversation_id) {
            Ok(conversation) => conversation,
            Err(StoreError::NotFound { .. }) => {
                debug!(group_id = %group.group_id, "no conversation to refresh");
                return;
            }
            Err(err) => {
                warn!(group_id = %group.group_id, error = %err, "conversation load failed");
                return;
            }
        };
        conversation.show_name = group.group_name.clone();
        conversation.face_url = group.face_url.clone();
        match self.store.upsert_conversation(conversation.clone()) {
            Ok(()) => self
                .notifier
                .conversation()
                .on_conversation_changed(&conversation),
            Err(err) => {
                warn!(group_id = %group.group_id, error = %err, "conversation refresh failed")
            }
        }
    }

    /// A deleted or dismissed group keeps no members and, once gone, no
    /// member version record.
    fn cleanup_members(&self, group_id: &str, drop_version: bool) {
        if let Err(err) = self.store.delete_group_members(group_id) {
            warn!(group_id, error = %err, "member cleanup failed");
        }
        if drop_version {
            if let Err(err) = self.store.delete_version(MEMBER_VERSION_TABLE, group_id) {
                warn!(group_id, error = %err, "version record cleanup failed");
            }
        }
    }
}

impl<S, F> SyncTarget for GroupTarget<S, F>
where
    S: GroupStore + ReadStore + VersionStore,
    F: PageFetcher,
{
    type Entity = Group;
    type Key = String;
    type Page = Paged<Group>;

    fn key(&self, entity: &Group) -> String {
        entity.group_id.clone()
    }

    fn local_entities(&self, _scope_id: &str) -> EngineResult<Vec<Group>> {
        Ok(self.store.groups()?)
    }

    fn fetch_page(&self, request: &PageRequest) -> EngineResult<Paged<Group>> {
        self.fetcher.joined_groups(request)
    }

    fn page_entities(&self, page: &Paged<Group>) -> Vec<Group> {
        page.entities.clone()
    }

    fn page_has_more(&self, page: &Paged<Group>) -> bool {
        page.has_more
    }

    fn insert(&self, entity: &Group) -> EngineResult<()> {
        Ok(self.store.insert_group(entity.clone())?)
    }

    fn update(&self, server: &Group, _local: &Group) -> EngineResult<()> {
        Ok(self.store.update_group(server.clone())?)
    }

    fn delete(&self, entity: &Group) -> EngineResult<()> {
        Ok(self.store.delete_group(&entity.group_id)?)
    }

    fn batch_insert(&self, entities: &[Group]) -> EngineResult<()> {
        Ok(self.store.batch_insert_groups(entities.to_vec())?)
    }

    fn delete_all(&self, _scope_id: &str) -> EngineResult<()> {
        Ok(self.store.delete_all_groups()?)
    }

    fn notify(&self, change: &Change<Group>) {
        let listener = self.notifier.group();
        match change {
            Change::Insert { server } => listener.on_joined_group_added(server),
            Change::Update { server, local } => {
                if server.status == GroupStatus::Dismissed && local.status != GroupStatus::Dismissed
                {
                    self.cleanup_members(&server.group_id, false);
                    listener.on_group_dismissed(server);
                } else {
                    listener.on_group_info_changed(server);
                }
                if server.group_name != local.group_name || server.face_url != local.face_url {
                    self.refresh_conversation(server);
                }
            }
            Change::Delete { local } => {
                self.cleanup_members(&local.group_id, true);
                listener.on_joined_group_deleted(local);
            }
            Change::BatchInsert { server } => {
                for group in server {
                    listener.on_joined_group_added(group);
                }
            }
            Change::DeleteAll { scope_id } => debug!(scope_id, "joined groups cleared"),
        }
    }
}

/// Syncs one group's member collection.
struct MemberTarget<S, F> {
    store: Arc<S>,
    fetcher: Arc<F>,
    notifier: Arc<Notifier>,
}

impl<S, F> SyncTarget for MemberTarget<S, F>
where
    S: GroupStore,
    F: PageFetcher,
{
    type Entity = GroupMember;
    type Key = (String, String);
    type Page = Paged<GroupMember>;

    fn key(&self, entity: &GroupMember) -> (String, String) {
        entity.key()
    }

    fn local_entities(&self, scope_id: &str) -> EngineResult<Vec<GroupMember>> {
        Ok(self.store.group_members(scope_id)?)
    }

    fn fetch_page(&self, request: &PageRequest) -> EngineResult<Paged<GroupMember>> {
        self.fetcher.group_members(request)
    }

    fn page_entities(&self, page: &Paged<GroupMember>) -> Vec<GroupMember> {
        page.entities.clone()
    }

    fn page_has_more(&self, page: &Paged<GroupMember>) -> bool {
        page.has_more
    }

    fn insert(&self, entity: &GroupMember) -> EngineResult<()> {
        Ok(self.store.insert_member(entity.clone())?)
    }

    fn update(&self, server: &GroupMember, _local: &GroupMember) -> EngineResult<()> {
        Ok(self.store.update_member(server.clone())?)
    }

    fn delete(&self, entity: &GroupMember) -> EngineResult<()> {
        Ok(self.store.delete_member(&entity.group_id, &entity.user_id)?)
    }

    fn batch_insert(&self, entities: &[GroupMember]) -> EngineResult<()> {
        Ok(self.store.batch_insert_members(entities.to_vec())?)
    }

    fn delete_all(&self, scope_id: &str) -> EngineResult<()> {
        Ok(self.store.delete_group_members(scope_id)?)
    }

    fn notify(&self, change: &Change<GroupMember>) {
        let listener = self.notifier.group();
        match change {
            Change::Insert { server } => listener.on_group_member_added(server),
            Change::Update { server, .. } => listener.on_group_member_info_changed(server),
            Change::Delete { local } => listener.on_group_member_deleted(local),
            Change::BatchInsert { server } => {
                for member in server {
                    listener.on_group_member_added(member);
                }
            }
            Change::DeleteAll { scope_id } => debug!(scope_id, "group members cleared"),
        }
    }
}

/// Syncs the local user's join requests.
struct RequestTarget<S, F> {
    store: Arc<S>,
    fetcher: Arc<F>,
    notifier: Arc<Notifier>,
}

impl<S, F> RequestTarget<S, F> {
    fn notify_request(&self, request: &GroupRequest) {
        let listener = self.notifier.group();
        match request.handle_result {
            HandleResult::Unprocessed => listener.on_application_added(request),
            HandleResult::Agree => listener.on_application_accepted(request),
            HandleResult::Refuse => listener.on_application_rejected(request),
        }
    }
}

impl<S, F> SyncTarget for RequestTarget<S, F>
where
    S: GroupStore,
    F: PageFetcher,
{
    type Entity = GroupRequest;
    type Key = (String, String);
    type Page = Paged<GroupRequest>;

    fn key(&self, entity: &GroupRequest) -> (String, String) {
        (entity.group_id.clone(), entity.user_id.clone())
    }

    fn local_entities(&self, _scope_id: &str) -> EngineResult<Vec<GroupRequest>> {
        Ok(self.store.group_requests()?)
    }

    fn fetch_page(&self, request: &PageRequest) -> EngineResult<Paged<GroupRequest>> {
        self.fetcher.group_requests(request)
    }

    fn page_entities(&self, page: &Paged<GroupRequest>) -> Vec<GroupRequest> {
        page.entities.clone()
    }

    fn page_has_more(&self, page: &Paged<GroupRequest>) -> bool {
        page.has_more
    }

    fn insert(&self, entity: &GroupRequest) -> EngineResult<()> {
        Ok(self.store.insert_request(entity.clone())?)
    }

    fn update(&self, server: &GroupRequest, _local: &GroupRequest) -> EngineResult<()> {
        Ok(self.store.update_request(server.clone())?)
    }

    fn delete(&self, entity: &GroupRequest) -> EngineResult<()> {
        Ok(self.store.delete_request(&entity.group_id, &entity.user_id)?)
    }

    fn delete_all(&self, _scope_id: &str) -> EngineResult<()> {
        for request in self.store.group_requests()? {
            self.store
                .delete_request(&request.group_id, &request.user_id)?;
        }
        Ok(())
    }

    fn notify(&self, change: &Change<GroupRequest>) {
        match change {
            Change::Insert { server } | Change::Update { server, .. } => {
                self.notify_request(server)
            }
            Change::BatchInsert { server } => {
                for request in server {
                    self.notify_request(request);
                }
            }
            Change::Delete { .. } => {}
            Change::DeleteAll { scope_id } => debug!(scope_id, "join requests cleared"),
        }
    }
}

/// Drives group-domain synchronization for one session.
pub struct GroupSync<S, F> {
    store: Arc<S>,
    fetcher: Arc<F>,
    notifier: Arc<Notifier>,
    login_user_id: String,
    member_workers: usize,
}

impl<S, F> GroupSync<S, F>
where
    S: GroupStore + ReadStore + VersionStore + 'static,
    F: PageFetcher + 'static,
{
    /// Creates a group syncer for `login_user_id`.
    pub fn new(
        store: Arc<S>,
        fetcher: Arc<F>,
        notifier: Arc<Notifier>,
        login_user_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            fetcher,
            notifier,
            login_user_id: login_user_id.into(),
            member_workers: 4,
        }
    }

    /// Sets the member fan-out concurrency ceiling.
    pub fn with_member_workers(mut self, workers: usize) -> Self {
        self.member_workers = workers.max(1);
        self
    }

    /// Fully syncs the joined-group collection.
    pub fn sync_joined_groups(&self) -> ClientResult<SyncSummary> {
        let reconciler = Reconciler::new(GroupTarget {
            store: Arc::clone(&self.store),
            fetcher: Arc::clone(&self.fetcher),
            notifier: Arc::clone(&self.notifier),
        });
        Ok(reconciler.full_sync(&self.login_user_id)?)
    }

    /// Fully syncs the local user's join requests.
    pub fn sync_group_requests(&self) -> ClientResult<SyncSummary> {
        let reconciler = Reconciler::new(RequestTarget {
            store: Arc::clone(&self.store),
            fetcher: Arc::clone(&self.fetcher),
            notifier: Arc::clone(&self.notifier),
        });
        Ok(reconciler.full_sync(&self.login_user_id)?)
    }

    /// Syncs member collections for the given groups in parallel.
    ///
    /// Each group is one unit of work: probe the server version marker,
    /// skip the page walk when it matches the stored record, otherwise run
    /// a full sync and store the new marker. The first failing group aborts
    /// units not yet dispatched; dispatched ones finish.
    pub fn sync_group_members(&self, group_ids: &[String]) -> ClientResult<()> {
        if group_ids.is_empty() {
            return Ok(());
        }
        let pool = TaskPool::new(self.member_workers.min(group_ids.len()));
        for group_id in group_ids {
            let group_id = group_id.clone();
            let store = Arc::clone(&self.store);
            let fetcher = Arc::clone(&self.fetcher);
            let notifier = Arc::clone(&self.notifier);
            pool.submit(move || {
                let server_version = fetcher.member_version(&group_id)?;
                if let Some(record) = store.get_version(MEMBER_VERSION_TABLE, &group_id)? {
                    if record.version == server_version {
                        debug!(group_id, version = %server_version, "members up to date");
                        return Ok(());
                    }
                }
                let reconciler = Reconciler::new(MemberTarget {
                    store: Arc::clone(&store),
                    fetcher,
                    notifier,
                });
                reconciler.full_sync(&group_id)?;
                store.set_version(VersionRecord::new(
                    MEMBER_VERSION_TABLE,
                    &group_id,
                    server_version,
                ))?;
                Ok(())
            });
        }
        Ok(pool.wait()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatsync_engine::{EngineError, GroupListener};
    use chatsync_store::{Conversation, ConversationType, MemoryStore};
    use parking_lot::{Mutex, RwLock};
    use std::collections::HashMap;

    #[derive(Default)]
    struct MockFetcher {
        groups: RwLock<Vec<Group>>,
        members: RwLock<HashMap<String, Vec<GroupMember>>>,
        requests: RwLock<Vec<GroupRequest>>,
        versions: RwLock<HashMap<String, String>>,
        member_fetches: Mutex<Vec<String>>,
    }

    impl PageFetcher for MockFetcher {
        fn joined_groups(&self, _request: &PageRequest) -> EngineResult<Paged<Group>> {
            Ok(Paged::last(self.groups.read().clone()))
        }

        fn group_members(&self, request: &PageRequest) -> EngineResult<Paged<GroupMember>> {
            self.member_fetches.lock().push(request.scope_id.clone());
            Ok(Paged::last(
                self.members
                    .read()
                    .get(&request.scope_id)
                    .cloned()
                    .unwrap_or_default(),
            ))
        }

        fn group_requests(&self, _request: &PageRequest) -> EngineResult<Paged<GroupRequest>> {
            Ok(Paged::last(self.requests.read().clone()))
        }

        fn member_version(&self, group_id: &str) -> EngineResult<String> {
            self.versions
                .read()
                .get(group_id)
                .cloned()
                .ok_or_else(|| EngineError::fetch(format!("no version for {group_id}")))
        }
    }

    #[derive(Default)]
    struct RecordingGroupListener {
        events: Mutex<Vec<String>>,
    }

    impl RecordingGroupListener {
        fn events(&self) -> Vec<String> {
            self.events.lock().clone()
        }
    }

    impl GroupListener for RecordingGroupListener {
        fn on_joined_group_added(&self, group: &Group) {
            self.events.lock().push(format!("added:{}", group.group_id));
        }
        fn on_joined_group_deleted(&self, group: &Group) {
            self.events.lock().push(format!("deleted:{}", group.group_id));
        }
        fn on_group_info_changed(&self, group: &Group) {
            self.events.lock().push(format!("changed:{}", group.group_id));
        }
        fn on_group_dismissed(&self, group: &Group) {
            self.events.lock().push(format!("dismissed:{}", group.group_id));
        }
        fn on_group_member_added(&self, member: &GroupMember) {
            self.events
                .lock()
                .push(format!("member-added:{}/{}", member.group_id, member.user_id));
        }
        fn on_group_member_deleted(&self, member: &GroupMember) {
            self.events
                .lock()
                .push(format!("member-deleted:{}/{}", member.group_id, member.user_id));
        }
        fn on_application_accepted(&self, request: &GroupRequest) {
            self.events
                .lock()
                .push(format!("accepted:{}/{}", request.group_id, request.user_id));
        }
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        fetcher: Arc<MockFetcher>,
        listener: Arc<RecordingGroupListener>,
        sync: GroupSync<MemoryStore, MockFetcher>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let fetcher = Arc::new(MockFetcher::default());
        let notifier = Arc::new(Notifier::new());
        let listener = Arc::new(RecordingGroupListener::default());
        notifier.set_group_listener(Arc::clone(&listener) as Arc<dyn GroupListener>);
        let sync = GroupSync::new(
            Arc::clone(&store),
            Arc::clone(&fetcher),
            notifier,
            "me",
        );
        Fixture {
            store,
            fetcher,
            listener,
            sync,
        }
    }

    fn group(id: &str, name: &str) -> Group {
        Group {
            group_id: id.into(),
            group_name: name.into(),
            ..Default::default()
        }
    }

    fn member(group_id: &str, user_id: &str) -> GroupMember {
        GroupMember {
            group_id: group_id.into(),
            user_id: user_id.into(),
            ..Default::default()
        }
    }

    #[test]
    fn fresh_sync_batch_inserts_joined_groups() {
        let f = fixture();
        *f.fetcher.groups.write() = vec![group("g1", "alpha"), group("g2", "beta")];

        let summary = f.sync.sync_joined_groups().unwrap();

        assert_eq!(summary.batch_inserted, 2);
        assert_eq!(f.store.groups().unwrap().len(), 2);
        assert_eq!(f.listener.events(), vec!["added:g1", "added:g2"]);
    }

    #[test]
    fn dismissed_group_drops_its_members() {
        let f = fixture();
        f.store.insert_group(group("g1", "alpha")).unwrap();
        f.store.insert_member(member("g1", "u1")).unwrap();
        f.store.insert_member(member("g1", "u2")).unwrap();

        let mut dismissed = group("g1", "alpha");
        dismissed.status = GroupStatus::Dismissed;
        *f.fetcher.groups.write() = vec![dismissed];

        f.sync.sync_joined_groups().unwrap();

        assert!(f.store.group_members("g1").unwrap().is_empty());
        assert_eq!(f.listener.events(), vec!["dismissed:g1"]);
    }

    #[test]
    fn deleted_group_drops_members_and_version_record() {
        let f = fixture();
        f.store.insert_group(group("g1", "alpha")).unwrap();
        f.store.insert_member(member("g1", "u1")).unwrap();
        f.store
            .set_version(VersionRecord::new(MEMBER_VERSION_TABLE, "g1", "v1"))
            .unwrap();

        f.sync.sync_joined_groups().unwrap();

        assert!(f.store.group("g1").unwrap().is_none());
        assert!(f.store.group_members("g1").unwrap().is_empty());
        assert!(f
            .store
            .get_version(MEMBER_VERSION_TABLE, "g1")
            .unwrap()
            .is_none());
        assert_eq!(f.listener.events(), vec!["deleted:g1"]);
    }

    #[test]
    fn name_change_refreshes_the_group_conversation() {
        let f = fixture();
        f.store.insert_group(group("g1", "alpha")).unwrap();
        f.store
            .upsert_conversation(Conversation {
                conversation_id: group_conversation_id("g1"),
                conversation_type: ConversationType::Group,
                group_id: "g1".into(),
                show_name: "alpha".into(),
                ..Default::default()
            })
            .unwrap();
        *f.fetcher.groups.write() = vec![group("g1", "omega")];

        f.sync.sync_joined_groups().unwrap();

        let conversation = f.store.conversation(&group_conversation_id("g1")).unwrap();
        assert_eq!(conversation.show_name, "omega");
        assert_eq!(f.listener.events(), vec!["changed:g1"]);
    }

    #[test]
    fn member_sync_skips_groups_with_matching_version() {
        let f = fixture();
        f.fetcher
            .members
            .write()
            .insert("g1".into(), vec![member("g1", "u1")]);
        f.fetcher.versions.write().insert("g1".into(), "v1".into());

        let groups = vec!["g1".to_string()];
        f.sync.sync_group_members(&groups).unwrap();
        assert_eq!(f.store.group_members("g1").unwrap().len(), 1);
        assert_eq!(f.fetcher.member_fetches.lock().len(), 1);
        assert_eq!(
            f.store
                .get_version(MEMBER_VERSION_TABLE, "g1")
                .unwrap()
                .unwrap()
                .version,
            "v1"
        );

        // Unchanged version: one probe, no page walk.
        f.sync.sync_group_members(&groups).unwrap();
        assert_eq!(f.fetcher.member_fetches.lock().len(), 1);

        // Bumped version triggers a resync.
        f.fetcher.versions.write().insert("g1".into(), "v2".into());
        f.fetcher
            .members
            .write()
            .insert("g1".into(), vec![member("g1", "u1"), member("g1", "u2")]);
        f.sync.sync_group_members(&groups).unwrap();
        assert_eq!(f.fetcher.member_fetches.lock().len(), 2);
        assert_eq!(f.store.group_members("g1").unwrap().len(), 2);
    }

    #[test]
    fn member_sync_fans_out_across_groups() {
        let f = fixture();
        for gid in ["g1", "g2", "g3"] {
            f.fetcher
                .members
                .write()
                .insert(gid.into(), vec![member(gid, "u1")]);
            f.fetcher.versions.write().insert(gid.into(), "v1".into());
        }

        let groups: Vec<String> = ["g1", "g2", "g3"].iter().map(|s| s.to_string()).collect();
        f.sync.sync_group_members(&groups).unwrap();

        for gid in ["g1", "g2", "g3"] {
            assert_eq!(f.store.group_members(gid).unwrap().len(), 1);
        }
    }

    #[test]
    fn member_sync_surfaces_the_first_error() {
        let f = fixture();
        f.fetcher.versions.write().insert("g1".into(), "v1".into());
        // g2 has no version marker, so its probe fails.

        let groups = vec!["g1".to_string(), "g2".to_string()];
        let err = f.sync.sync_group_members(&groups).unwrap_err();
        assert!(matches!(
            err,
            crate::error::ClientError::Engine(EngineError::Fetch(_))
        ));
    }

    #[test]
    fn accepted_request_fires_accepted_event() {
        let f = fixture();
        f.store
            .insert_request(GroupRequest {
                group_id: "g1".into(),
                user_id: "me".into(),
                handle_result: HandleResult::Unprocessed,
                ..Default::default()
            })
            .unwrap();
        *f.fetcher.requests.write() = vec![GroupRequest {
            group_id: "g1".into(),
            user_id: "me".into(),
            handle_result: HandleResult::Agree,
            ..Default::default()
        }];

        f.sync.sync_group_requests().unwrap();

        assert_eq!(f.listener.events(), vec!["accepted:g1/me"]);
        assert_eq!(
            f.store.group_requests().unwrap()[0].handle_result,
            HandleResult::Agree
        );
    }
}

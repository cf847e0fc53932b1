//! End-to-end tests for the client layer.
//!
//! An in-memory server backs the page-fetch boundary; the session connects
//! through the mock dialer, so read acknowledgements travel the real frame
//! path.

use chatsync_client::{ClientSession, GroupSync, PageFetcher};
use chatsync_conn::{ConnConfig, MockDialer};
use chatsync_engine::{
    ConversationListener, EngineResult, GroupListener, Notifier,
};
use chatsync_proto::{decode_frame, FrameOptions, PageRequest, Paged, ReadReceiptTip};
use chatsync_store::{
    Conversation, ConversationType, Group, GroupMember, GroupRequest, GroupStatus, GroupStore,
    MemoryStore, Message, ReadStore, VersionStore,
};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

/// Server-side collections the client syncs against.
#[derive(Default)]
struct InMemoryServer {
    groups: RwLock<Vec<Group>>,
    members: RwLock<HashMap<String, Vec<GroupMember>>>,
    member_versions: RwLock<HashMap<String, String>>,
    requests: RwLock<Vec<GroupRequest>>,
}

impl InMemoryServer {
    fn set_group(&self, group: Group) {
        let mut groups = self.groups.write();
        groups.retain(|g| g.group_id != group.group_id);
        groups.push(group);
    }

    fn remove_group(&self, group_id: &str) {
        self.groups.write().retain(|g| g.group_id != group_id);
    }

    fn set_members(&self, group_id: &str, members: Vec<GroupMember>, version: &str) {
        self.members.write().insert(group_id.to_string(), members);
        self.member_versions
            .write()
            .insert(group_id.to_string(), version.to_string());
    }
}

impl PageFetcher for InMemoryServer {
    fn joined_groups(&self, request: &PageRequest) -> EngineResult<Paged<Group>> {
        Ok(page(&self.groups.read(), request))
    }

    fn group_members(&self, request: &PageRequest) -> EngineResult<Paged<GroupMember>> {
        let members = self.members.read();
        Ok(page(
            members.get(&request.scope_id).map(Vec::as_slice).unwrap_or(&[]),
            request,
        ))
    }

    fn group_requests(&self, request: &PageRequest) -> EngineResult<Paged<GroupRequest>> {
        Ok(page(&self.requests.read(), request))
    }

    fn member_version(&self, group_id: &str) -> EngineResult<String> {
        Ok(self
            .member_versions
            .read()
            .get(group_id)
            .cloned()
            .unwrap_or_else(|| "v0".to_string()))
    }
}

/// Slices a collection into the requested page.
fn page<T: Clone>(all: &[T], request: &PageRequest) -> Paged<T> {
    let size = request.show_number as usize;
    let start = (request.page_number.saturating_sub(1) as usize) * size;
    let end = (start + size).min(all.len());
    if start >= all.len() {
        return Paged::empty();
    }
    Paged::new(all[start..end].to_vec(), end < all.len())
}

#[derive(Default)]
struct EventLog {
    group_events: Mutex<Vec<String>>,
    latest_changed: Mutex<Vec<String>>,
    totals: Mutex<Vec<u32>>,
}

impl GroupListener for EventLog {
    fn on_joined_group_added(&self, group: &Group) {
        self.group_events.lock().push(format!("added:{}", group.group_id));
    }
    fn on_joined_group_deleted(&self, group: &Group) {
        self.group_events.lock().push(format!("deleted:{}", group.group_id));
    }
    fn on_group_info_changed(&self, group: &Group) {
        self.group_events.lock().push(format!("changed:{}", group.group_id));
    }
    fn on_group_dismissed(&self, group: &Group) {
        self.group_events.lock().push(format!("dismissed:{}", group.group_id));
    }
}

impl ConversationListener for EventLog {
    fn on_latest_message_changed(&self, conversation_id: &str) {
        self.latest_changed.lock().push(conversation_id.to_string());
    }
    fn on_total_unread_changed(&self, total: u32) {
        self.totals.lock().push(total);
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

fn wire_listeners(notifier: &Notifier) -> Arc<EventLog> {
    let log = Arc::new(EventLog::default());
    notifier.set_group_listener(Arc::clone(&log) as Arc<dyn GroupListener>);
    notifier.set_conversation_listener(Arc::clone(&log) as Arc<dyn ConversationListener>);
    log
}

#[test]
fn group_sync_converges_across_server_changes() {
    init_logging();
    let server = Arc::new(InMemoryServer::default());
    server.set_group(group("g1", "alpha"));
    server.set_group(group("g2", "beta"));
    server.set_members("g1", vec![member("g1", "me"), member("g1", "u2")], "v1");
    server.set_members("g2", vec![member("g2", "me")], "v1");

    let store = Arc::new(MemoryStore::new());
    let notifier = Arc::new(Notifier::new());
    let log = wire_listeners(&notifier);
    let sync = GroupSync::new(
        Arc::clone(&store),
        Arc::clone(&server),
        Arc::clone(&notifier),
        "me",
    )
    .with_member_workers(2);

    // First pass: everything lands through the batch fast path.
    let summary = sync.sync_joined_groups().unwrap();
    assert_eq!(summary.batch_inserted, 2);
    sync.sync_group_members(&["g1".to_string(), "g2".to_string()])
        .unwrap();
    assert_eq!(store.group_members("g1").unwrap().len(), 2);
    assert_eq!(store.group_members("g2").unwrap().len(), 1);

    // Server-side churn: g1 renamed, g2 gone, g3 appears.
    server.set_group(group("g1", "alpha-renamed"));
    server.remove_group("g2");
    server.set_group(group("g3", "gamma"));

    log.group_events.lock().clear();
    let summary = sync.sync_joined_groups().unwrap();
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.inserted, 1);
    assert_eq!(summary.deleted, 1);

    let mut events = log.group_events.lock().clone();
    events.sort();
    assert_eq!(events, vec!["added:g3", "changed:g1", "deleted:g2"]);

    // g2's members went with the group.
    assert!(store.group_members("g2").unwrap().is_empty());
    assert!(store.group("g2").unwrap().is_none());

    // Member resync: the bumped version marker forces a page walk and the
    // departed member is deleted locally.
    server.set_members("g1", vec![member("g1", "me")], "v2");
    sync.sync_group_members(&["g1".to_string()]).unwrap();
    assert_eq!(store.group_members("g1").unwrap().len(), 1);
    assert_eq!(
        store
            .get_version("group_members", "g1")
            .unwrap()
            .unwrap()
            .version,
        "v2"
    );
}

#[test]
fn pagination_walks_every_page() {
    init_logging();
    let server = Arc::new(InMemoryServer::default());
    let many: Vec<GroupMember> = (0..250)
        .map(|i| member("g1", &format!("u{i:03}")))
        .collect();
    server.set_members("g1", many, "v1");
    server.set_group(group("g1", "alpha"));

    let store = Arc::new(MemoryStore::new());
    let sync = GroupSync::new(
        Arc::clone(&store),
        Arc::clone(&server),
        Arc::new(Notifier::new()),
        "me",
    );
    sync.sync_group_members(&["g1".to_string()]).unwrap();

    assert_eq!(store.group_members("g1").unwrap().len(), 250);
}

#[test]
fn dismissed_group_cleanup_flows_through_full_sync() {
    init_logging();
    let server = Arc::new(InMemoryServer::default());
    server.set_group(group("g1", "alpha"));
    server.set_members("g1", vec![member("g1", "me"), member("g1", "u2")], "v1");

    let store = Arc::new(MemoryStore::new());
    let notifier = Arc::new(Notifier::new());
    let log = wire_listeners(&notifier);
    let sync = GroupSync::new(
        Arc::clone(&store),
        Arc::clone(&server),
        Arc::clone(&notifier),
        "me",
    );
    sync.sync_joined_groups().unwrap();
    sync.sync_group_members(&["g1".to_string()]).unwrap();
    assert_eq!(store.group_members("g1").unwrap().len(), 2);

    let mut dismissed = group("g1", "alpha");
    dismissed.status = GroupStatus::Dismissed;
    server.set_group(dismissed);
    sync.sync_joined_groups().unwrap();

    assert!(store.group_members("g1").unwrap().is_empty());
    assert!(log
        .group_events
        .lock()
        .contains(&"dismissed:g1".to_string()));
}

#[test]
fn read_flow_over_the_session_connection() {
    init_logging();
    let dialer = MockDialer::new();
    let wire = dialer.push_success();

    let store = Arc::new(MemoryStore::new());
    store
        .upsert_conversation(Conversation {
            conversation_id: "c1".into(),
            conversation_type: ConversationType::Single,
            user_id: "peer".into(),
            unread_count: 10,
            ..Default::default()
        })
        .unwrap();
    for seq in 91..=100 {
        store
            .insert_message(Message {
                conversation_id: "c1".into(),
                client_msg_id: format!("m{seq}"),
                seq,
                send_id: "peer".into(),
                ..Default::default()
            })
            .unwrap();
    }

    let config = ConnConfig::new("wss://chat.example.com", "me", "tok", 5);
    let session = ClientSession::login(config, Arc::clone(&store), dialer).unwrap();
    let log = wire_listeners(session.notifier());
    let tracker = session.read_tracker();

    let first_half: Vec<String> = (91..=95).map(|s| format!("m{s}")).collect();
    tracker.mark_messages_read("c1", &first_half).unwrap();
    assert_eq!(store.conversation("c1").unwrap().unread_count, 5);
    assert!(log.latest_changed.lock().is_empty());

    let second_half: Vec<String> = (96..=100).map(|s| format!("m{s}")).collect();
    tracker.mark_messages_read("c1", &second_half).unwrap();
    let conversation = store.conversation("c1").unwrap();
    assert_eq!(conversation.unread_count, 0);
    assert_eq!(conversation.has_read_seq, 100);
    assert_eq!(*log.latest_changed.lock(), vec!["c1".to_string()]);
    assert_eq!(*log.totals.lock(), vec![5, 0]);

    // Re-marking costs no further wire traffic.
    let frames_before = wire.lock().sent.len();
    tracker.mark_messages_read("c1", &second_half).unwrap();
    assert_eq!(wire.lock().sent.len(), frames_before);

    // Both acks travelled as real frames.
    let sent = wire.lock().sent.clone();
    assert_eq!(sent.len(), 2);
    for bytes in &sent {
        let frame = decode_frame(bytes, &FrameOptions::default()).unwrap();
        assert_eq!(frame.sender_id, "me");
    }

    session.logout().unwrap();
    assert!(wire.lock().closed);
}

#[test]
fn receipt_echo_from_another_device_converges_unread() {
    init_logging();
    let store = Arc::new(MemoryStore::new());
    store
        .upsert_conversation(Conversation {
            conversation_id: "c1".into(),
            conversation_type: ConversationType::Single,
            unread_count: 3,
            ..Default::default()
        })
        .unwrap();
    for seq in 1..=3 {
        store
            .insert_message(Message {
                conversation_id: "c1".into(),
                client_msg_id: format!("m{seq}"),
                seq,
                send_id: "peer".into(),
                ..Default::default()
            })
            .unwrap();
    }

    let notifier = Arc::new(Notifier::new());
    let log = wire_listeners(&notifier);
    let tracker = chatsync_client::ReadStateTracker::new(
        Arc::clone(&store),
        chatsync_client::MockAcker::new(),
        notifier,
        "me",
    );

    let tip = ReadReceiptTip::watermark("c1", "me", 3, 1_000);
    tracker.handle_read_receipt(&tip).unwrap();

    let conversation = store.conversation("c1").unwrap();
    assert_eq!(conversation.unread_count, 0);
    assert_eq!(conversation.has_read_seq, 3);
    assert_eq!(*log.latest_changed.lock(), vec!["c1".to_string()]);
}

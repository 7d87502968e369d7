use models::{NewTaskAssignment, ProfileMetadata, Role, Table, TaskAssignment};
use picking_client::{DataService, MemoryService, MemoryStore, SessionStore};
use picking_sync::dashboard::{self, Kind};
use picking_sync::hooks::{
    CategoryPerformanceHook, Chat, DamageReports, InventoryHook, PerformanceMetrics, PickLists,
    RealTimePickers, TaskAssignments,
};
use picking_sync::widgets::{DamageReportFields, Form};
use picking_sync::{AuthProvider, AuthState, Context, Screen, Toaster};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const PASSWORD: &str = "correct-horse";

struct Fixture {
    service: Arc<MemoryService>,
    store: Arc<MemoryStore>,
    warehouse: uuid::Uuid,
    picker: uuid::Uuid,
    other_picker: uuid::Uuid,
}

impl Fixture {
    fn new() -> Self {
        let (service, store) = MemoryService::standalone();
        let warehouse = uuid::Uuid::new_v4();

        let mut ids = Vec::new();
        for (email, name, employee_id, role) in [
            ("pia@example.com", "Pia Picker", "EMP001", "picker"),
            ("otto@example.com", "Otto Other", "EMP002", "picker"),
            ("sue@example.com", "Sue Supervisor", "EMP100", "supervisor"),
            ("ada@example.com", "Ada Admin", "EMP900", "admin"),
        ] {
            let id = uuid::Uuid::new_v4();
            service.seed(
                Table::Profiles,
                [json!({
                    "id": id,
                    "employee_id": employee_id,
                    "full_name": name,
                    "role": role,
                    "warehouse_id": warehouse,
                })],
            );
            service.seed_account(email, PASSWORD, id);
            ids.push(id);
        }

        Self {
            service,
            store,
            warehouse,
            picker: ids[0],
            other_picker: ids[1],
        }
    }

    fn mount(&self) -> AuthProvider {
        AuthProvider::mount(self.service.clone(), self.store.clone(), Toaster::new())
    }

    // Sign in as `email`, and return the provider once its Profile is loaded.
    async fn sign_in(&self, email: &str) -> (AuthProvider, Context) {
        let provider = self.mount();
        provider.resolved().await;
        provider.sign_in(email, PASSWORD).await.unwrap();

        provider
            .subscribe()
            .wait_for(|state| {
                state.user().and_then(|user| user.email.as_deref()) == Some(email)
                    && state.profile().is_some()
            })
            .await
            .unwrap();

        let ctx = Context::new(&provider);
        (provider, ctx)
    }

    fn seed_pick_list(&self, number: &str, picker: uuid::Uuid, created_at: &str) -> uuid::Uuid {
        let stored = self.service.seed(
            Table::PickLists,
            [json!({
                "list_number": number,
                "warehouse_id": self.warehouse,
                "assigned_picker_id": picker,
                "status": "pending",
                "priority": "high",
                "total_items": 2,
                "picked_items": 0,
                "created_at": created_at,
            })],
        );
        serde_json::from_value(stored[0]["id"].clone()).unwrap()
    }
}

fn new_task(picker: uuid::Uuid) -> NewTaskAssignment {
    NewTaskAssignment {
        picker_id: picker,
        task_type: "pick_list".to_string(),
        priority: "high".to_string(),
        status: "pending".to_string(),
        due_date: None,
        notes: None,
        task_id: None,
    }
}

// Wait until `cond` holds of the hook, re-checking as its data changes.
macro_rules! eventually {
    ($hook:expr, $cond:expr) => {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if $cond(&*$hook.data_or_default()) {
                    break;
                }
                $hook.changed().await;
            }
        })
        .await
        .expect("condition was not reached")
    };
}

#[tokio::test]
async fn test_hooks_are_inert_without_a_warehouse() {
    let fixture = Fixture::new();
    let provider = fixture.mount();
    provider.resolved().await;

    provider
        .sign_up(
            "new@example.com",
            PASSWORD,
            &ProfileMetadata {
                full_name: "New Hire".to_string(),
                employee_id: "EMP500".to_string(),
                role: Role::Supervisor,
            },
        )
        .await
        .unwrap();
    provider.sign_in("new@example.com", PASSWORD).await.unwrap();

    let state = provider
        .subscribe()
        .wait_for(|state| state.profile().is_some())
        .await
        .unwrap()
        .clone();
    assert_eq!(state.profile().unwrap().warehouse_id, None);

    let ctx = Context::new(&provider);
    assert!(ctx.scope().is_none());

    let pick_lists = PickLists::mount(&ctx).await;
    let tasks = TaskAssignments::mount(&ctx).await;
    let metrics = PerformanceMetrics::mount(&ctx).await;
    let categories = CategoryPerformanceHook::mount(&ctx).await;
    let inventory = InventoryHook::mount(&ctx).await;
    let chat = Chat::mount(&ctx).await;
    let pickers = RealTimePickers::mount(&ctx).await;
    let damage = DamageReports::mount(&ctx).await;

    assert!(!pick_lists.is_loading() && pick_lists.data_or_default().is_empty());
    assert!(!tasks.is_loading() && tasks.data_or_default().is_empty());
    assert!(!metrics.is_loading() && metrics.data_or_default().is_empty());
    assert!(!categories.is_loading() && categories.data_or_default().is_empty());
    assert!(!inventory.is_loading() && inventory.data_or_default().is_empty());
    assert!(!chat.is_loading() && chat.data_or_default().is_empty());
    assert!(!pickers.is_loading() && pickers.data_or_default().is_empty());
    assert!(!damage.is_loading() && damage.data_or_default().is_empty());

    tokio::time::sleep(Duration::from_millis(10)).await;
    for table in [Table::PickLists, Table::TaskAssignments, Table::Inventory, Table::ChatMessages] {
        assert_eq!(fixture.service.select_count(table), 0, "{table} was read");
    }
    assert_eq!(fixture.service.active_subscriptions(), 0);

    // Mutations which need a scope refuse to run.
    let err = tasks.create(new_task(fixture.picker)).await.unwrap_err();
    assert_eq!(err.name(), "ScopeUnavailable");
}

#[tokio::test]
async fn test_sign_out_leaves_no_session() {
    let fixture = Fixture::new();
    let (provider, _ctx) = fixture.sign_in("sue@example.com").await;
    fixture.store.set("supabase.auth.code-verifier", "xyz".to_string());
    fixture.store.set("theme", "dark".to_string());

    // A failure to revoke remotely doesn't prevent sign-out.
    fixture.service.fail_sign_out("network unreachable");
    provider.sign_out().await;

    let keys: Vec<String> = fixture.store.snapshot().into_keys().collect();
    assert_eq!(keys, vec!["theme".to_string()]);

    let provider = fixture.mount();
    assert!(matches!(provider.resolved().await, AuthState::Unauthenticated));
}

#[tokio::test]
async fn test_sign_out_revokes_sessions() {
    let fixture = Fixture::new();
    let (provider, _ctx) = fixture.sign_in("sue@example.com").await;
    let stored = fixture.store.snapshot();

    provider.sign_out().await;

    // Restoring the old session doesn't resurrect it.
    for (key, value) in stored {
        fixture.store.set(&key, value);
    }
    let provider = fixture.mount();
    assert!(matches!(provider.resolved().await, AuthState::Unauthenticated));
}

#[tokio::test]
async fn test_sign_out_of_a_restored_session() {
    let fixture = Fixture::new();

    // Signed in by an earlier run of the application.
    picking_client::AuthService::sign_in_with_password(
        fixture.service.as_ref(),
        "sue@example.com",
        PASSWORD,
    )
    .await
    .unwrap();
    let stored = fixture.store.snapshot();

    // Sign out as soon as the provider is mounted, before it resolves.
    fixture.mount().sign_out().await;
    assert_eq!(fixture.service.revoked_sessions(), 1);
    assert!(fixture.store.keys().is_empty());

    for (key, value) in stored {
        fixture.store.set(&key, value);
    }
    let provider = fixture.mount();
    assert!(matches!(provider.resolved().await, AuthState::Unauthenticated));
}

#[tokio::test]
async fn test_refetch_is_stable_without_writes() {
    let fixture = Fixture::new();
    let (_provider, ctx) = fixture.sign_in("sue@example.com").await;
    fixture.seed_pick_list("PL-1", fixture.picker, "2024-05-01T10:00:00Z");

    let tasks = TaskAssignments::mount(&ctx).await;
    tasks.create(new_task(fixture.picker)).await.unwrap();

    let first = tasks.refetch().await.unwrap();
    let second = tasks.refetch().await.unwrap();
    assert_eq!(first, second);

    let lists = PickLists::mount(&ctx).await;
    assert_eq!(lists.refetch().await.unwrap(), lists.refetch().await.unwrap());
}

#[tokio::test]
async fn test_created_task_is_read_back() {
    let fixture = Fixture::new();
    let (_provider, ctx) = fixture.sign_in("sue@example.com").await;
    let mut toasts = ctx.toaster.subscribe();

    let tasks = TaskAssignments::mount(&ctx).await;
    let created = tasks.create(new_task(fixture.picker)).await.unwrap();
    assert!(!tasks.is_creating());

    let toast = toasts.recv().await.unwrap();
    assert_eq!(toast.title, "Task Assigned");

    let rows = tasks.refetch().await.unwrap();
    let row: &TaskAssignment = rows.iter().find(|t| t.id == created.id).unwrap();

    assert_eq!(row.picker_id, fixture.picker);
    assert_eq!(row.task_type, "pick_list");
    assert_eq!(row.priority, "high");
    assert_eq!(row.warehouse_id, fixture.warehouse);
    assert_eq!(Some(row.supervisor_id), ctx.profile().map(|p| p.id));
    assert!(row.assigned_at.is_some());
    assert!(row.created_at.is_some());
    assert!(row.updated_at.is_some());
}

#[tokio::test]
async fn test_failed_write_is_toasted_and_not_cached() {
    let fixture = Fixture::new();
    let (_provider, ctx) = fixture.sign_in("sue@example.com").await;
    let mut toasts = ctx.toaster.subscribe();

    let tasks = TaskAssignments::mount(&ctx).await;
    assert!(tasks.read().await.unwrap().is_empty());

    fixture.service.fail_next_write("permission denied for table task_assignments");
    let err = tasks.create(new_task(fixture.picker)).await.unwrap_err();
    assert_eq!(err.name(), "RemoteWriteFailure");

    let toast = toasts.recv().await.unwrap();
    assert_eq!(toast.title, "Assignment Failed");
    assert!(tasks.refetch().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_remote_changes_reach_mounted_hooks() {
    let fixture = Fixture::new();
    let (_provider, ctx) = fixture.sign_in("sue@example.com").await;

    let mut tasks = TaskAssignments::mount(&ctx).await;
    assert!(tasks.read().await.unwrap().is_empty());
    assert_eq!(fixture.service.active_subscriptions(), 1);

    // Written by another client: only the change notification informs this one.
    let row = fixture
        .service
        .insert(
            Table::TaskAssignments,
            json!({
                "warehouse_id": fixture.warehouse,
                "supervisor_id": uuid::Uuid::new_v4(),
                "picker_id": fixture.other_picker,
                "task_type": "inventory_check",
                "priority": "low",
                "status": "pending",
            }),
        )
        .await
        .unwrap();
    let id: uuid::Uuid = serde_json::from_value(row["id"].clone()).unwrap();

    eventually!(tasks, |rows: &Vec<TaskAssignment>| rows.iter().any(|t| t.id == id));

    // Unmounting the last observer closes the channel.
    drop(tasks);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(fixture.service.active_subscriptions(), 0);
}

#[tokio::test]
async fn test_dashboards_are_routed_by_role() {
    let fixture = Fixture::new();

    for (email, kind) in [
        ("pia@example.com", Kind::Picker),
        ("sue@example.com", Kind::Supervisor),
        ("ada@example.com", Kind::Admin),
    ] {
        let (provider, ctx) = fixture.sign_in(email).await;
        let screen = Screen::mount(&ctx).await;

        assert_eq!(screen.dashboard().map(|d| d.kind()), Some(kind), "{email}");
        assert_eq!(
            dashboard::route(ctx.profile().unwrap().role),
            kind,
            "{email}"
        );
        drop(screen);
        provider.sign_out().await;
    }

    let provider = fixture.mount();
    provider.resolved().await;
    let ctx = Context::new(&provider);
    assert!(matches!(Screen::mount(&ctx).await, Screen::SignIn { error: None }));
}

#[tokio::test(start_paused = true)]
async fn test_nothing_is_mounted_while_loading() {
    let fixture = Fixture::new();
    {
        let (provider, _ctx) = fixture.sign_in("ada@example.com").await;
        drop(provider);
    }
    // The stored session resolves only after its Profile is read.
    fixture.service.set_read_latency(Duration::from_secs(1));

    let provider = fixture.mount();
    let ctx = Context::new(&provider);
    assert!(matches!(Screen::mount(&ctx).await, Screen::Loading));

    provider.resolved().await;
    let ctx = Context::new(&provider);
    let screen = Screen::mount(&ctx).await;
    assert_eq!(screen.dashboard().map(|d| d.kind()), Some(Kind::Admin));
}

#[tokio::test]
async fn test_pickers_see_only_their_lists() {
    let fixture = Fixture::new();
    let mine = fixture.seed_pick_list("PL-1", fixture.picker, "2024-05-01T10:00:00Z");
    let newer = fixture.seed_pick_list("PL-2", fixture.picker, "2024-05-01T11:00:00Z");
    fixture.seed_pick_list("PL-3", fixture.other_picker, "2024-05-01T12:00:00Z");

    let (_provider, ctx) = fixture.sign_in("pia@example.com").await;
    let lists = PickLists::mount(&ctx).await;
    let ids: Vec<_> = lists.read().await.unwrap().iter().map(|l| l.id).collect();
    assert_eq!(ids, vec![newer, mine]);

    let (_provider, ctx) = fixture.sign_in("sue@example.com").await;
    let lists = PickLists::mount(&ctx).await;
    let numbers: Vec<_> = lists
        .read()
        .await
        .unwrap()
        .iter()
        .map(|l| l.list_number.clone())
        .collect();
    assert_eq!(numbers, vec!["PL-3", "PL-2", "PL-1"]);
}

#[tokio::test]
async fn test_pick_lists_join_items_and_products() {
    let fixture = Fixture::new();
    let list = fixture.seed_pick_list("PL-1", fixture.picker, "2024-05-01T10:00:00Z");
    let stored = fixture.service.seed(
        Table::Inventory,
        [json!({
            "warehouse_id": fixture.warehouse,
            "sku": "SKU-12345",
            "product_name": "Whey Protein 1kg",
            "location": "A-01-03",
            "quantity": 40,
            "reserved_quantity": 4,
        })],
    );
    fixture.service.seed(
        Table::PickListItems,
        [json!({
            "pick_list_id": list,
            "inventory_id": stored[0]["id"],
            "quantity_requested": 2,
            "quantity_picked": 0,
            "status": "pending",
        })],
    );

    let (_provider, ctx) = fixture.sign_in("pia@example.com").await;
    let lists = PickLists::mount(&ctx).await;
    let rows = lists.read().await.unwrap();

    let product = rows[0].items[0].product.as_ref().unwrap();
    assert_eq!(product.sku, "SKU-12345");
    assert_eq!(product.location, "A-01-03");

    let mut toasts = ctx.toaster.subscribe();
    let updated = lists.update_status(list, "completed").await.unwrap();
    assert!(updated.completed_at.is_some());
    assert_eq!(toasts.recv().await.unwrap().title, "Picklist Completed!");
    assert!(lists.refetch().await.unwrap()[0].is_completed());
}

#[tokio::test]
async fn test_chat_shows_visible_messages_with_senders() {
    let fixture = Fixture::new();

    let (_sue, ctx) = fixture.sign_in("sue@example.com").await;
    let chat = Chat::mount(&ctx).await;
    chat.send("Dock 4 is clear".to_string(), None, None, true)
        .await
        .unwrap();
    chat.send(
        "Please restock A-01".to_string(),
        Some(fixture.other_picker),
        None,
        false,
    )
    .await
    .unwrap();
    assert_eq!(chat.refetch().await.unwrap().len(), 2);
    drop(chat);

    // Pia sees the broadcast, but not a message addressed to Otto.
    let (_pia, ctx) = fixture.sign_in("pia@example.com").await;
    let chat = Chat::mount(&ctx).await;
    let rows = chat.read().await.unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].message_text, "Dock 4 is clear");
    assert_eq!(rows[0].message_type, "general");
    assert_eq!(rows[0].sender.as_ref().unwrap().full_name, "Sue Supervisor");
    assert_eq!(rows[0].sender.as_ref().unwrap().role, Role::Supervisor);
    assert_eq!(rows[0].recipient, None);
}

#[tokio::test]
async fn test_damage_reports_via_form() {
    let fixture = Fixture::new();
    let (_provider, ctx) = fixture.sign_in("pia@example.com").await;

    let mut reports = DamageReports::mount(&ctx).await;
    let mut form = Form::<DamageReportFields>::new();
    form.fields_mut().sku = "SKU-67890".to_string();
    form.fields_mut().damage_type = "expiry".to_string();

    // Missing description.
    assert_eq!(form.report(&reports).await.unwrap_err().name(), "Validation");

    form.fields_mut().description = "Product expired 2 months ago".to_string();
    let logged = form.report(&reports).await.unwrap();
    assert_eq!(form.fields(), &DamageReportFields::default());
    assert_eq!(logged.user_id, fixture.picker);

    eventually!(reports, |rows: &Vec<models::ActivityLog>| rows.len() == 1);
    let decoded = reports.reports();
    assert_eq!(decoded[0].1.damage_type, "expiry");
    assert_eq!(decoded[0].0.description, "Product expired 2 months ago");
}

#[tokio::test]
async fn test_pick_list_status_invalidates_picker_activity() {
    let fixture = Fixture::new();
    let list = fixture.seed_pick_list("PL-7", fixture.picker, "2024-05-01T10:00:00Z");
    let (_provider, ctx) = fixture.sign_in("sue@example.com").await;

    let mut pickers = RealTimePickers::mount(&ctx).await;
    let lists = PickLists::mount(&ctx).await;
    pickers.read().await.unwrap();
    lists.read().await.unwrap();

    let entry = pickers.entry().unwrap().clone();
    assert!(!entry.is_stale());

    lists.update_status(list, "in_progress").await.unwrap();
    // Invalidated by the mutation, before its change notification is delivered.
    assert!(entry.is_stale());

    eventually!(pickers, |rows: &Vec<picking_sync::hooks::PickerActivity>| rows
        .iter()
        .any(|p| p.current_pick_list.as_deref() == Some("PL-7")));
}

#[tokio::test]
async fn test_joins_stay_within_the_warehouse() {
    let fixture = Fixture::new();
    let elsewhere = uuid::Uuid::new_v4();

    // An inventory row and a profile of another warehouse.
    let foreign_item = uuid::Uuid::new_v4();
    fixture.service.seed(
        Table::Inventory,
        [json!({
            "id": foreign_item,
            "warehouse_id": elsewhere,
            "sku": "SKU-FOREIGN",
            "product_name": "Somebody Else's Stock",
            "location": "Z-99-99",
            "quantity": 1,
            "reserved_quantity": 0,
        })],
    );
    let stranger = uuid::Uuid::new_v4();
    fixture.service.seed(
        Table::Profiles,
        [json!({
            "id": stranger,
            "employee_id": "EMP777",
            "full_name": "Stranger",
            "role": "picker",
            "warehouse_id": elsewhere,
        })],
    );

    let list = fixture.seed_pick_list("PL-1", fixture.picker, "2024-05-01T10:00:00Z");
    fixture.service.seed(
        Table::PickListItems,
        [json!({
            "pick_list_id": list,
            "inventory_id": foreign_item,
            "quantity_requested": 1,
            "quantity_picked": 0,
            "status": "pending",
        })],
    );
    fixture.service.seed(
        Table::ChatMessages,
        [json!({
            "warehouse_id": fixture.warehouse,
            "sender_id": stranger,
            "message_text": "hello from afar",
            "message_type": "general",
            "is_broadcast": true,
        })],
    );
    fixture.service.seed(
        Table::PerformanceMetrics,
        [json!({
            "warehouse_id": fixture.warehouse,
            "picker_id": stranger,
            "date": "2024-05-01",
            "total_picks": 10,
            "successful_picks": 10,
            "exceptions": 0,
        })],
    );

    let (_provider, ctx) = fixture.sign_in("sue@example.com").await;

    let lists = PickLists::mount(&ctx).await;
    let rows = lists.read().await.unwrap();
    assert_eq!(rows[0].items.len(), 1);
    assert_eq!(rows[0].items[0].product, None);

    let chat = Chat::mount(&ctx).await;
    let messages = chat.read().await.unwrap();
    assert_eq!(messages[0].message_text, "hello from afar");
    assert_eq!(messages[0].sender, None);

    let metrics = PerformanceMetrics::mount(&ctx).await;
    let metrics = metrics.read().await.unwrap();
    assert_eq!(metrics[0].picker_id, stranger);
    assert_eq!(metrics[0].picker_name, None);
}

#[tokio::test(start_paused = true)]
async fn test_picker_activity_is_polled() {
    let fixture = Fixture::new();
    let (_provider, ctx) = fixture.sign_in("sue@example.com").await;

    let mut pickers = RealTimePickers::mount(&ctx).await;
    eventually!(pickers, |rows: &Vec<picking_sync::hooks::PickerActivity>| rows.len() == 2);
    let reads = fixture.service.select_count(Table::PerformanceMetrics);

    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(fixture.service.select_count(Table::PerformanceMetrics), reads + 1);

    let names: Vec<_> = pickers
        .data_or_default()
        .iter()
        .map(|p| p.name.clone())
        .collect();
    assert_eq!(names, vec!["Otto Other", "Pia Picker"]);
}

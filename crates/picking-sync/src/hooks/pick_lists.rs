use super::{deref_query, mount_query};
use crate::{Context, Error, Messages, Mutation, Query, QueryKey, Scope, Trigger};
use models::{
    pick_list_status, Inventory, ItemProduct, PickList, PickListItem, PickListUpdate, Role, Table,
};
use picking_client::{fetch, update, Backend, ChannelFilter, Select};
use std::collections::HashMap;

pub const RESOURCE: &str = "pickLists";

/// PickLists observes the pick lists of the warehouse, with their line items
/// and item products. A picker sees only the lists assigned to them.
pub struct PickLists {
    query: Query<Vec<PickList>>,
    ctx: Context,
    update: Mutation,
}

deref_query!(PickLists, Vec<PickList>);

impl PickLists {
    pub async fn mount(ctx: &Context) -> Self {
        let scope = ctx.scope();
        let key = scope.as_ref().map(query_key);

        let triggers = match &scope {
            Some(scope) => vec![Trigger::Push(ChannelFilter::warehouse(
                Table::PickLists,
                scope.warehouse_id,
            ))],
            None => Vec::new(),
        };

        let backend = ctx.backend.clone();
        let query = mount_query(ctx, key, triggers, move || {
            let backend = backend.clone();
            let scope = scope.clone();

            async move {
                match scope {
                    Some(scope) => {
                        fetch_pick_lists(backend.as_ref(), scope.warehouse_id, assignee(&scope))
                            .await
                    }
                    None => Ok(Vec::new()),
                }
            }
        })
        .await;

        Self {
            query,
            ctx: ctx.clone(),
            update: Mutation::new(
                ctx.query.clone(),
                ctx.toaster.clone(),
                &[RESOURCE, super::pickers::RESOURCE],
            ),
        }
    }

    /// Transition the pick list `id` to `status`.
    pub async fn update_status(&self, id: uuid::Uuid, status: &str) -> Result<PickList, Error> {
        let backend = self.ctx.backend.clone();
        let patch = PickListUpdate::status(status);

        let updated: PickList = self
            .update
            .run(
                Messages {
                    success: None,
                    failure: ("Update Failed", "Failed to update pick list status."),
                },
                async move { update(backend.as_ref(), Table::PickLists, id, &patch).await },
            )
            .await?;

        if updated.is_completed() {
            self.ctx.toaster.info(
                "Picklist Completed!",
                format!(
                    "Order {} has been completed successfully.",
                    updated.list_number
                ),
            );
        }
        Ok(updated)
    }

    pub fn is_updating(&self) -> bool {
        self.update.is_pending()
    }

    /// Lists which are not yet completed.
    pub fn open_lists(&self) -> Vec<PickList> {
        self.data_or_default()
            .iter()
            .filter(|list| !list.is_completed())
            .cloned()
            .collect()
    }
}

fn query_key(scope: &Scope) -> QueryKey {
    let key = QueryKey::new(RESOURCE).scoped(scope.warehouse_id);

    match assignee(scope) {
        Some(picker_id) => key.scoped(picker_id),
        None => key,
    }
}

// Pickers see only lists assigned to them.
fn assignee(scope: &Scope) -> Option<uuid::Uuid> {
    (scope.profile.role == Role::Picker).then_some(scope.profile.id)
}

/// Fetch pick lists of the warehouse, newest first, joined with their items
/// and the products of those items.
pub async fn fetch_pick_lists(
    backend: &dyn Backend,
    warehouse_id: uuid::Uuid,
    assigned_picker_id: Option<uuid::Uuid>,
) -> anyhow::Result<Vec<PickList>> {
    let mut select = Select::from(Table::PickLists).eq("warehouse_id", warehouse_id);
    if let Some(picker_id) = assigned_picker_id {
        select = select.eq("assigned_picker_id", picker_id);
    }
    let mut lists: Vec<PickList> = fetch(backend, select.order_desc("created_at")).await?;

    if lists.is_empty() {
        return Ok(lists);
    }

    let items: Vec<PickListItem> = fetch(
        backend,
        Select::from(Table::PickListItems)
            .in_("pick_list_id", lists.iter().map(|list| list.id))
            .order_asc("created_at"),
    )
    .await?;

    let products: HashMap<uuid::Uuid, ItemProduct> = if items.is_empty() {
        HashMap::new()
    } else {
        let inventory: Vec<Inventory> = fetch(
            backend,
            Select::from(Table::Inventory)
                .eq("warehouse_id", warehouse_id)
                .in_("id", items.iter().map(|item| item.inventory_id)),
        )
        .await?;

        inventory
            .into_iter()
            .map(|row| {
                (
                    row.id,
                    ItemProduct {
                        sku: row.sku,
                        product_name: row.product_name,
                        location: row.location,
                    },
                )
            })
            .collect()
    };

    let mut by_list: HashMap<uuid::Uuid, Vec<PickListItem>> = HashMap::new();
    for mut item in items {
        item.product = products.get(&item.inventory_id).cloned();
        by_list.entry(item.pick_list_id).or_default().push(item);
    }
    for list in &mut lists {
        list.items = by_list.remove(&list.id).unwrap_or_default();
    }

    tracing::debug!(%warehouse_id, lists = lists.len(), "fetched pick lists");
    Ok(lists)
}

/// Statuses to which a pick list may be transitioned.
pub const STATUSES: &[&str] = &[
    pick_list_status::PENDING,
    pick_list_status::IN_PROGRESS,
    pick_list_status::COMPLETED,
];

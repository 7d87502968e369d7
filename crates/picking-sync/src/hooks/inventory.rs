use super::{deref_query, mount_query};
use crate::{Context, Query, QueryKey};
use models::{Inventory, Table};
use picking_client::{fetch, Select};

pub const RESOURCE: &str = "inventory";

/// InventoryHook observes the product records of the warehouse, by product name.
pub struct InventoryHook {
    query: Query<Vec<Inventory>>,
}

deref_query!(InventoryHook, Vec<Inventory>);

impl InventoryHook {
    pub async fn mount(ctx: &Context) -> Self {
        let warehouse_id = ctx.scope().map(|scope| scope.warehouse_id);
        let key = warehouse_id.map(|id| QueryKey::new(RESOURCE).scoped(id));

        let backend = ctx.backend.clone();
        let query = mount_query(ctx, key, Vec::new(), move || {
            let backend = backend.clone();

            async move {
                let Some(warehouse_id) = warehouse_id else {
                    return Ok(Vec::new());
                };
                fetch(
                    backend.as_ref(),
                    Select::from(Table::Inventory)
                        .eq("warehouse_id", warehouse_id)
                        .order_asc("product_name"),
                )
                .await
            }
        })
        .await;

        Self { query }
    }

    /// Products having no available quantity.
    pub fn out_of_stock(&self) -> Vec<Inventory> {
        self.data_or_default()
            .iter()
            .filter(|row| row.available() == 0)
            .cloned()
            .collect()
    }
}

use crate::output::CliOutput;
use models::Inventory as Product;
use picking_sync::hooks::InventoryHook;

#[derive(Debug, clap::Args)]
#[clap(rename_all = "kebab-case")]
pub struct Inventory {
    #[clap(subcommand)]
    cmd: Command,
}

#[derive(Debug, clap::Subcommand)]
#[clap(rename_all = "kebab-case")]
pub enum Command {
    /// List products of the warehouse by name.
    List(List),
}

#[derive(Debug, clap::Args)]
#[clap(rename_all = "kebab-case")]
pub struct List {
    /// Show only products having no available quantity.
    #[clap(long)]
    out_of_stock: bool,
    /// Show only products of this category.
    #[clap(long)]
    category: Option<String>,
}

impl Inventory {
    pub async fn run(&self, ctx: &mut crate::CliContext) -> anyhow::Result<()> {
        let sync = ctx.sync().await?;
        let inventory = InventoryHook::mount(&sync).await;

        match &self.cmd {
            Command::List(List {
                out_of_stock,
                category,
            }) => {
                let mut rows = if *out_of_stock {
                    inventory.read().await?;
                    inventory.out_of_stock()
                } else {
                    (*inventory.read().await?).clone()
                };
                if let Some(category) = category {
                    rows.retain(|row| row.category.as_deref() == Some(category.as_str()));
                }
                ctx.write_all(rows)
            }
        }
    }
}

impl CliOutput for Product {
    type CellValue = String;

    fn table_headers() -> Vec<&'static str> {
        vec![
            "SKU", "Product", "Location", "Category", "Quantity", "Reserved", "Available",
        ]
    }

    fn into_table_row(self) -> Vec<Self::CellValue> {
        vec![
            self.sku.clone(),
            self.product_name.clone(),
            self.location.clone(),
            self.category.clone().unwrap_or_default(),
            self.quantity.to_string(),
            self.reserved_quantity.to_string(),
            self.available().to_string(),
        ]
    }
}

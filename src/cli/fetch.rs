use super::ui;
use crate::core::{Aggregator, SourceStatus, TokenomicsRecord};
use crate::server::routes::SuccessResponse;
use anyhow::{Context, Result};
use comfy_table::Cell;

impl TokenomicsRecord {
    pub fn display_as_table(&self) -> String {
        let mut table = ui::new_styled_table();
        table.set_header(vec![ui::header_cell("Metric"), ui::header_cell("Value")]);

        let text_cell = |value: &Option<String>| ui::format_optional_cell(value.clone(), |v| v);

        table.add_row(vec![Cell::new("Name"), text_cell(&self.token_name)]);
        table.add_row(vec![Cell::new("Symbol"), text_cell(&self.token_symbol)]);
        table.add_row(vec![
            Cell::new("Price (USD)"),
            ui::format_optional_cell(self.price_usd, |p| ui::format_fixed(p, 8)),
        ]);
        table.add_row(vec![
            Cell::new("24h Change"),
            self.price_change_percentage_24h
                .map_or_else(|| ui::format_optional_cell(None::<String>, |v| v), ui::change_cell),
        ]);
        table.add_row(vec![
            Cell::new("24h Volume (USD)"),
            ui::format_optional_cell(self.volume_24h, |v| ui::format_fixed(v, 8)),
        ]);
        table.add_row(vec![
            Cell::new("Market Cap (USD)"),
            ui::format_optional_cell(self.market_cap, ui::format_millions),
        ]);
        table.add_row(vec![
            Cell::new("Total Supply"),
            ui::format_optional_cell(self.total_supply, ui::format_millions),
        ]);
        table.add_row(vec![
            Cell::new("Circulating Supply"),
            ui::format_optional_cell(self.circulating_supply, ui::format_millions),
        ]);

        let source = |status: SourceStatus| match status {
            SourceStatus::Available => status.to_string(),
            SourceStatus::Failed => ui::style_text(&status.to_string(), ui::StyleType::Error),
        };

        let mut output = format!(
            "Token: {}\n\n",
            ui::style_text(&self.address, ui::StyleType::Title)
        );
        output.push_str(&table.to_string());
        output.push_str(&format!(
            "\n\nSources: price {}, supply {}",
            source(self.data_sources.price),
            source(self.data_sources.supply)
        ));
        output.push_str(&ui::style_text(
            &format!("\nFetched at {}", self.fetched_at.to_rfc3339()),
            ui::StyleType::Subtle,
        ));

        output
    }
}

pub async fn run(aggregator: &Aggregator, address: &str, json: bool) -> Result<()> {
    let spinner = (!json).then(|| ui::new_spinner("Fetching tokenomics..."));
    let result = aggregator.get_tokenomics(address).await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    let record =
        result.with_context(|| format!("Failed to retrieve tokenomics for {address}"))?;

    if json {
        let envelope = SuccessResponse {
            message: "Market data retrieved successfully".to_string(),
            data: record,
        };
        println!("{}", serde_json::to_string_pretty(&envelope)?);
    } else {
        println!("{}", record.display_as_table());
    }
    Ok(())
}

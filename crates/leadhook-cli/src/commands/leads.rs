use colored::Colorize;
use leadhook_core::models::Lead;

pub async fn list(server: &str, limit: u32) -> anyhow::Result<()> {
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{server}/api/leads?limit={limit}"))
        .send()
        .await?;

    if !resp.status().is_success() {
        anyhow::bail!("Failed to list leads: {}", resp.status());
    }

    let leads: Vec<Lead> = resp.json().await?;
    if leads.is_empty() {
        println!("{}", "No leads received yet.".dimmed());
        return Ok(());
    }

    println!("{}", "Recent Leads:".bold());
    for lead in &leads {
        println!(
            "  {} {} page {} form {} ({})",
            "●".green(),
            lead.lead_id,
            lead.page_id.as_deref().unwrap_or("-"),
            lead.form_id.as_deref().unwrap_or("-"),
            lead.created_at.format("%Y-%m-%d %H:%M:%S").to_string().dimmed()
        );
    }

    Ok(())
}

use colored::Colorize;
use leadhook_core::models::ServerStatus;

pub async fn run(server: &str) -> anyhow::Result<()> {
    let client = reqwest::Client::new();

    let resp = client.get(format!("{server}/api/status")).send().await;

    match resp {
        Ok(resp) if resp.status().is_success() => {
            let status: ServerStatus = resp.json().await?;
            let yes_no = |flag: bool| if flag { "yes".green() } else { "no".red() };

            println!("{}", "Leadhook Status".bold());
            println!("  Instance:      {}", status.instance_name.cyan());
            println!("  Site:          {}", status.site);
            println!("  Version:       {}", status.version);
            println!("  Uptime:        {}s", status.uptime_seconds);
            println!("  Enabled:       {}", yes_no(status.enabled));
            println!("  Webhook live:  {}", yes_no(status.webhook_is_active));
            println!("  Leads:         {}", status.total_leads);
            println!("  Subscriptions: {} active", status.active_subscriptions);
        }
        Ok(resp) => {
            anyhow::bail!("Server returned error: {}", resp.status());
        }
        Err(e) => {
            println!("{} Cannot connect to Leadhook server at {server}", "✕".red());
            println!("  {}", e.to_string().dimmed());
            println!(
                "\n  Start the server with: {}",
                "leadhook serve --config config/leadhook.toml".cyan()
            );
        }
    }

    Ok(())
}

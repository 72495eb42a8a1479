use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::services::SummaryService;

pub async fn handle(
    service: &SummaryService,
    limit: Option<u32>,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    let profiles = service.recent_learners(limit).await?;

    match output_format {
        OutputFormat::Json => output_success(
            output_format,
            &format!("Retrieved {} recent students", profiles.len()),
            Some(serde_json::to_value(&profiles)?),
        ),
        OutputFormat::Text => {
            if profiles.is_empty() {
                println!("No students found");
            }
            for profile in &profiles {
                println!(
                    "{:>10}  {:<24} {:<32} {}",
                    profile.id, profile.username, profile.email, profile.timecreated
                );
            }
            Ok(())
        }
    }
}

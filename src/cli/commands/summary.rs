use crate::cli::utils::{or_unset, output_error, output_success};
use crate::cli::OutputFormat;
use crate::database::models::StudentSummary;
use crate::services::{SummaryError, SummaryService};

pub async fn handle(
    service: &SummaryService,
    user_id: i64,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    let summary = match service.get_summary(user_id).await {
        Ok(summary) => summary,
        Err(err @ SummaryError::NotFound(_)) => {
            output_error(output_format, &err.to_string())?;
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    match output_format {
        OutputFormat::Json => output_success(
            output_format,
            "Student data retrieved",
            Some(serde_json::to_value(&summary)?),
        ),
        OutputFormat::Text => {
            print_summary(&summary);
            Ok(())
        }
    }
}

fn print_summary(summary: &StudentSummary) {
    let profile = &summary.profile;
    println!(
        "Student {}: {} ({} {})",
        profile.id, profile.username, profile.firstname, profile.lastname
    );
    println!(
        "Email: {}, completed courses: {}",
        profile.email, summary.course_completed_count
    );
    println!("Degree: {}", or_unset(summary.user_degree.as_deref()));

    println!("\nCategory progress");
    for progress in &summary.category_progress {
        println!(
            "  {}: {}/{} ({}%)",
            progress.category_group,
            progress.completed_courses,
            progress.total_courses,
            progress.completion_percent
        );
    }

    let stats = &summary.thirty_day_stats;
    println!("\nLast 30 days");
    println!("  enrolled:  {}", stats.enrolled_courses_30days);
    println!("  completed: {}", stats.completed_courses_30days);
    println!("  rate:      {}%", stats.completion_rate_30days);

    if summary.is_degraded() {
        let names: Vec<_> = summary.degraded.iter().map(|m| m.name()).collect();
        println!("\nWarning: defaults used for {}", names.join(", "));
    }
}

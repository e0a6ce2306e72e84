// Terminal output - coloured summary of a report

use crate::anomaly::{Anomaly, AnomalySeverity};
use crate::checks::CheckSet;
use crate::health::{AuthorityHealth, AuthorityStatus, CrlStatus, HealthSnapshot, SectionStatus};
use crate::report::{AnomalyReport, EventSummary, HealthReport};
use crate::status::OverallStatus;
use colored::*;

fn print_section_header(title: &str) {
    println!("\n{}", title.cyan().bold());
    println!("{}", "=".repeat(50));
}

fn format_status_indicator(value: bool) -> ColoredString {
    if value { "Y".green() } else { "X".red() }
}

/// Overall status with its colour
pub fn format_overall(status: OverallStatus) -> ColoredString {
    let text = status.to_string();
    match status {
        OverallStatus::Healthy => text.green().bold(),
        OverallStatus::Warning => text.yellow().bold(),
        OverallStatus::Error => text.red(),
        OverallStatus::Critical => text.red().bold(),
    }
}

fn format_severity(severity: AnomalySeverity) -> ColoredString {
    let text = format!("[{}]", severity);
    match severity {
        AnomalySeverity::Low => text.normal(),
        AnomalySeverity::Medium => text.yellow(),
        AnomalySeverity::High => text.red(),
        AnomalySeverity::Critical => text.red().bold(),
    }
}

fn format_authority(authority: &AuthorityHealth) -> String {
    let status = match authority.status {
        AuthorityStatus::Online => "Online".green(),
        AuthorityStatus::Offline => "Offline".red().bold(),
        AuthorityStatus::Unknown => "Unknown".yellow(),
    };
    let expiry = if authority.certificate_expiring {
        " (certificate expiring)".yellow().to_string()
    } else {
        String::new()
    };
    format!("  {:<30} {}{}", authority.name, status, expiry)
}

fn print_infrastructure(snapshot: &HealthSnapshot) {
    print_section_header("Infrastructure");

    for authority in snapshot.authorities() {
        println!("{}", format_authority(authority));
    }

    for crl in &snapshot.revocation_lists {
        let status = match crl.status {
            CrlStatus::Valid => "Valid".green(),
            CrlStatus::Expiring => "Expiring".yellow(),
            CrlStatus::Expired => "Expired".red().bold(),
            CrlStatus::Unknown => "Unknown".yellow(),
        };
        println!("  CRL {:<26} {}", crl.authority, status);
    }

    for responder in &snapshot.responders {
        let timing = responder
            .elapsed_ms
            .map(|ms| format!(" ({}ms)", ms).dimmed().to_string())
            .unwrap_or_default();
        println!(
            "  OCSP {:<25} {}{}",
            responder.name,
            format_status_indicator(responder.available),
            timing
        );
    }

    for service in &snapshot.services {
        println!(
            "  Service {:<22} {} {}",
            service.name,
            format_status_indicator(service.is_running()),
            service.status
        );
    }

    if let Some(stats) = &snapshot.cert_store {
        println!(
            "  Certificates: {} issued, {} revoked, {} pending, {} failed, {} expiring soon",
            stats.total_issued,
            stats.revoked,
            stats.pending_requests,
            stats.failed_requests,
            stats.expiring_soon
        );
    }

    for (section, detail) in snapshot.degraded_sections() {
        println!("  {} {}: {}", "!".yellow().bold(), section, detail.dimmed());
    }
}

fn print_checks(title: &str, checks: &CheckSet) {
    print_section_header(&format!(
        "{} ({}/{} passed)",
        title,
        checks.passed_count(),
        checks.len()
    ));
    for (name, result) in checks.iter() {
        let marker = if result.data_available {
            format_status_indicator(result.passed)
        } else {
            "?".yellow()
        };
        println!("  {} {:<24} {}", marker, name, result.detail.dimmed());
    }
}

fn print_events(events: &EventSummary) {
    match &events.source {
        SectionStatus::Available => println!(
            "  Events {} - {}: {} fetched, {} classified, {} unrecognized, {} rejected",
            events.window_start.format("%Y-%m-%d %H:%M"),
            events.window_end.format("%Y-%m-%d %H:%M"),
            events.fetched,
            events.classified,
            events.unrecognized,
            events.rejected
        ),
        SectionStatus::Unknown { detail } => {
            println!("  {} event source unavailable: {}", "!".yellow().bold(), detail)
        }
    }
}

fn print_anomaly_list(anomalies: &[Anomaly]) {
    if anomalies.is_empty() {
        println!("  {}", "No anomalies detected".green());
        return;
    }
    for anomaly in anomalies {
        println!(
            "  {} {} [{}] {}",
            format_severity(anomaly.severity),
            anomaly.kind,
            anomaly.scope_key,
            anomaly.detail
        );
    }
}

/// Print a full health report
pub fn print_report(report: &HealthReport) {
    println!(
        "\n{} {}",
        "PKI Health:".bold(),
        format_overall(report.overall_status)
    );
    println!(
        "{}",
        format!("Generated {}", report.timestamp.to_rfc3339()).dimmed()
    );

    print_infrastructure(&report.infrastructure);
    print_checks("Compliance", &report.compliance);
    print_checks("Security", &report.security);

    print_section_header("Anomalies");
    print_events(&report.events);
    print_anomaly_list(&report.anomalies);

    if !report.recommendations.is_empty() {
        print_section_header("Recommendations");
        for (index, line) in report.recommendations.iter().enumerate() {
            println!("  {}. {}", index + 1, line);
        }
    }
}

/// Print the result of an anomaly-only run
pub fn print_anomaly_report(report: &AnomalyReport) {
    print_section_header("Anomalies");
    print_events(&report.events);
    print_anomaly_list(&report.anomalies);
}

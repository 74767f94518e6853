use batch_core::{TerminalKind, TrackerEvent, TrackerViewModel};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    /// One JSON object per line.
    Json,
}

pub fn render_event(event: &TrackerEvent, format: OutputFormat) -> serde_json::Result<String> {
    match format {
        OutputFormat::Json => serde_json::to_string(event),
        OutputFormat::Text => Ok(event_text(event)),
    }
}

fn event_text(event: &TrackerEvent) -> String {
    match event {
        TrackerEvent::Registered { job_id, source } => format!(
            "[{job_id}] queued {} ({}, {} bytes)",
            source.file_name,
            source.media_kind.mime_type(),
            source.byte_len
        ),
        TrackerEvent::PollingStarted { job_id } => format!("[{job_id}] processing"),
        TrackerEvent::NewResult {
            job_id,
            record,
            progress,
        } => {
            let mut line = format!("[{job_id}] result {} ({progress})", record.key);
            match &record.duplicate_message {
                Some(message) => line.push_str(&format!(" (duplicate: {message})")),
                None if record.already_exists => line.push_str(" (duplicate)"),
                None => {}
            }
            line
        }
        TrackerEvent::Progress {
            job_id,
            current,
            total,
        } => format!("[{job_id}] page {current}/{total}"),
        TrackerEvent::Notice { job_id, message } => format!("[{job_id}] note: {message}"),
        TrackerEvent::Warning { job_id, message } => format!("[{job_id}] warning: {message}"),
        TrackerEvent::Terminal {
            job_id,
            kind: TerminalKind::Complete,
            ..
        } => format!("[{job_id}] completed"),
        TrackerEvent::Terminal {
            job_id,
            kind: TerminalKind::Error,
            message,
        } => match message {
            Some(message) => format!("[{job_id}] failed: {message}"),
            None => format!("[{job_id}] failed"),
        },
    }
}

pub fn render_view(view: &TrackerViewModel, format: OutputFormat) -> serde_json::Result<Vec<String>> {
    if format == OutputFormat::Json {
        return Ok(vec![serde_json::to_string(view)?]);
    }

    let mut lines: Vec<String> = view
        .jobs
        .iter()
        .map(|row| {
            let mut line = format!(
                "[{}] {} {} {} results={}",
                row.job_id, row.file_name, row.state, row.progress, row.result_count
            );
            if row.warning_count > 0 {
                line.push_str(&format!(" warnings={}", row.warning_count));
            }
            if let Some(message) = &row.message {
                line.push_str(&format!(" ({message})"));
            }
            line
        })
        .collect();
    lines.push(format!(
        "{} job(s): {} in flight, {} completed, {} failed, {} result(s)",
        view.job_count, view.in_flight, view.completed, view.failed, view.total_results
    ));
    Ok(lines)
}

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use tracing_subscriber::EnvFilter;
use war_api_analyzer::analyzer::{AnalyzeOptions, analyze_with_options};
use war_api_analyzer::cli::{Cli, Commands, OutputFormat};
use war_api_analyzer::config::resolve_timeout;
use war_api_analyzer::report::ApiReport;

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command.clone() {
        Commands::Analyze {
            war_path,
            format,
            output,
        } => {
            let options = AnalyzeOptions {
                timeout: resolve_timeout(&cli),
                cancel: None,
            };
            let report = analyze_with_options(&war_path, &options)
                .with_context(|| format!("分析失败: {}", war_path.display()))?;
            write_report(&report, format, output.as_deref())?;
        }
    }

    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn write_report(report: &ApiReport, format: OutputFormat, output: Option<&Path>) -> Result<()> {
    let content = match format {
        OutputFormat::Json => serde_json::to_string_pretty(report)?,
        OutputFormat::Text => render_text(report),
    };

    if let Some(path) = output {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("无法创建目录: {}", parent.display()))?;
        }
        std::fs::write(path, content)
            .with_context(|| format!("无法写入输出文件: {}", path.display()))?;
    } else {
        print!("{content}");
        if !content.ends_with('\n') {
            println!();
        }
    }

    Ok(())
}

fn render_text(report: &ApiReport) -> String {
    let summary = &report.analysis_summary;
    let dist = &summary.http_methods_distribution;
    let mut out = String::new();

    out.push_str(&format!("war_file_name: {}\n", report.war_file_name));
    out.push_str(&format!("analysis_date: {}\n", report.analysis_date));
    out.push_str(&format!("total_apis: {}\n", report.total_apis));
    out.push_str(&format!(
        "state_altering: {}, read_only: {}, validated: {}, controllers: {}\n",
        summary.state_altering_apis,
        summary.read_only_apis,
        summary.validated_apis,
        summary.controller_classes
    ));
    out.push_str(&format!(
        "verbs: GET={} POST={} PUT={} DELETE={} PATCH={} OPTIONS={} HEAD={}\n",
        dist.get, dist.post, dist.put, dist.delete, dist.patch, dist.options, dist.head
    ));
    for api in &report.apis {
        out.push_str(&format!(
            "- {} {} {}#{} alters_state={} validation={}\n",
            api.http_method,
            api.api_url,
            api.controller_class,
            api.controller_method,
            api.alters_state,
            api.validation.len()
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use war_api_analyzer::report::{ApiEndpoint, MethodDetails};

    #[test]
    fn text_rendering_lists_every_endpoint() {
        let report = ApiReport::assemble(
            "demo.war",
            vec![ApiEndpoint {
                api_url: "/api/users".to_string(),
                http_method: "GET".to_string(),
                controller_class: "com.ex.UserController".to_string(),
                controller_method: "list".to_string(),
                alters_state: false,
                validation: vec![],
                method_details: MethodDetails::default(),
            }],
        );

        let text = render_text(&report);
        assert!(text.contains("total_apis: 1"));
        assert!(text.contains("- GET /api/users com.ex.UserController#list"));
        assert!(text.contains("verbs: GET=1"));
    }
}

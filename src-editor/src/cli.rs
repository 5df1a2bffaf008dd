use std::fs;
use std::path::Path;

use log::{debug, info};
use serde_json::json;

use tessera_core::settings::{read_settings_from, settings_path, write_settings_to};
use tessera_core::{ai_configured, DiagramModel, Settings, SharedModel};
use tessera_suggest::{parse_response, validate, ChangePreview, ExecutionReport, ParsedResponse, TextPreview};

use crate::args::{AnalyzeArgs, Cli, Command, SettingsArgs};
use crate::{Editor, EditorError};

pub async fn run(cli: Cli) -> Result<(), EditorError> {
    let path = cli.settings.clone().unwrap_or_else(settings_path);
    debug!(settings = path.display().to_string(); "using settings file");

    match cli.command {
        Command::Analyze(args) => analyze(args, read_settings_from(&path)).await,
        Command::Preview { diagram, response } => preview(&diagram, &response),
        Command::Settings(args) => settings(&path, args),
    }
}

fn load_diagram(path: &Path) -> Result<DiagramModel, EditorError> {
    let raw = fs::read_to_string(path).map_err(EditorError::io(path))?;
    let value: serde_json::Value = serde_json::from_str(&raw)?;
    Ok(DiagramModel::from_json(value)?)
}

fn save_diagram(path: &Path, model: &DiagramModel) -> Result<(), EditorError> {
    let text = serde_json::to_string_pretty(&model.to_json()?)?;
    fs::write(path, text).map_err(EditorError::io(path))
}

async fn analyze(args: AnalyzeArgs, mut settings: Settings) -> Result<(), EditorError> {
    if let Some(provider) = args.provider {
        settings.ai.provider = provider;
    }
    if let Some(model) = args.model {
        settings.ai.model = model;
    }

    let model = SharedModel::new(load_diagram(&args.diagram)?);
    info!(
        diagram = args.diagram.display().to_string(),
        elements = model.with(|m| m.elements().len());
        "diagram loaded"
    );

    let mut editor = Editor::from_settings(model, &settings)?;
    let parsed = editor.analyze_diagram(&args.context).await?;
    print_analysis(&parsed, &editor.preview().render());

    if !args.apply {
        editor.stop_collaboration();
        return Ok(());
    }

    let report = editor.apply_pending().await?;
    print_report(&report);

    if editor.connection_status().active {
        if let Err(err) = editor.sync_now().await {
            eprintln!("could not share the changes: {err}");
        }
        editor.stop_collaboration();
    }

    let output = args.output.unwrap_or(args.diagram);
    editor.model().with(|m| save_diagram(&output, m))?;
    println!("Diagrama guardado en {}", output.display());
    Ok(())
}

fn preview(diagram: &Path, response: &Path) -> Result<(), EditorError> {
    let model = load_diagram(diagram)?;
    let raw = fs::read_to_string(response).map_err(EditorError::io(response))?;

    let mut parsed = parse_response(&raw, &model);
    parsed.changes = validate(&parsed.changes, &model);

    let mut text = TextPreview::default();
    text.show(&parsed.changes);
    print_analysis(&parsed, &text.render());
    Ok(())
}

fn print_analysis(parsed: &ParsedResponse, preview: &str) {
    println!("{}\n", parsed.analysis);
    for bubble in &parsed.bubbles {
        let target = bubble.target_class.as_deref().unwrap_or("-");
        println!("[{:?}] {target}: {}", bubble.kind, bubble.message);
    }
    if !parsed.bubbles.is_empty() {
        println!();
    }
    println!("{preview}");
}

fn print_report(report: &ExecutionReport) {
    println!(
        "\n{} cambio(s) aplicado(s), {} sin efecto, {} fallido(s)",
        report.applied,
        report.skipped,
        report.failures.len()
    );
    for failure in &report.failures {
        println!("  {} ({}): {}", failure.command, failure.description, failure.reason);
    }
}

/// Stored settings with the API key and session token masked.
pub fn masked(settings: &Settings) -> serde_json::Value {
    json!({
        "provider": settings.ai.provider,
        "model": settings.ai.model,
        "hasKey": !settings.ai.api_key.is_empty(),
        "configured": ai_configured(&settings.ai),
        "timeoutSecs": settings.ai.timeout_secs,
        "sync": {
            "endpoint": settings.sync.endpoint,
            "intervalMs": settings.sync.interval_ms,
            "requestTimeoutMs": settings.sync.request_timeout_ms,
            "hasSessionToken": settings.sync.session_token.is_some(),
            "userId": settings.sync.user_id,
        },
    })
}

pub fn apply_settings(settings: &mut Settings, args: SettingsArgs) {
    if let Some(provider) = args.provider {
        settings.ai.provider = provider;
    }
    if let Some(model) = args.model {
        settings.ai.model = model;
    }
    // Empty key means "keep existing"
    if let Some(key) = args.api_key.filter(|k| !k.is_empty()) {
        settings.ai.api_key = key;
    }
    if let Some(secs) = args.timeout_secs {
        settings.ai.timeout_secs = secs;
    }
    if let Some(endpoint) = args.endpoint {
        settings.sync.endpoint = endpoint;
    }
    if let Some(token) = args.session_token {
        settings.sync.session_token = Some(token).filter(|t| !t.is_empty());
    }
    if let Some(user) = args.user_id {
        settings.sync.user_id = Some(user).filter(|u| !u.is_empty());
    }
    if let Some(ms) = args.interval_ms {
        settings.sync.interval_ms = ms;
    }
}

fn settings(path: &Path, args: SettingsArgs) -> Result<(), EditorError> {
    let mut settings = read_settings_from(path);
    if !args.is_empty() {
        apply_settings(&mut settings, args);
        write_settings_to(path, &settings).map_err(EditorError::Settings)?;
        info!(path = path.display().to_string(); "settings saved");
    }
    println!("{}", serde_json::to_string_pretty(&masked(&settings))?);
    Ok(())
}

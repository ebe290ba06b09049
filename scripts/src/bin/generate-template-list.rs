use anyhow::Result;
use brevo_mailer::{config::Workspace, loader::templates::find_html_files};

fn main() -> Result<()> {
    let workspace = Workspace::from_env(".");
    let templates_dir = workspace.templates_dir();

    let templates = if templates_dir.is_dir() {
        find_html_files(&templates_dir)?
            .iter()
            .filter_map(|path| path.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .collect::<Vec<String>>()
    } else {
        eprintln!("Directory not found: {}", templates_dir.display());
        vec![]
    };

    let list_file = workspace.template_list_file();
    std::fs::write(&list_file, serde_json::to_string_pretty(&templates)?)?;

    println!("Generated template list with {} templates", templates.len());
    println!("Saved to {}", list_file.display());
    println!("\nAvailable templates:");
    for (idx, template) in templates.iter().enumerate() {
        println!("{}. {}", idx + 1, template);
    }
    Ok(())
}

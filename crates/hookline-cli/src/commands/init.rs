use std::path::Path;

use anyhow::Result;
use tracing::info;

const STARTER_RULES: &str = r#"# Hookline rules
#
# Each [[rules]] entry binds one lifecycle event to a handler. Command
# handlers receive the serialized event on stdin and speak through their
# exit code (0 = ok, 2 = hard block, anything else = advisory warning)
# or a JSON decision on stdout. Prompt handlers send an instruction to a
# completion backend and expect {"decision", "reason", "continue"} back.

[[rules]]
id = "guard-shell"
event = "PreAction"
matcher = "Bash"
kind = "command"
command = ["./hooks/guard.sh"]
timeout_secs = 10

# [[rules]]
# id = "review-edits"
# event = "PreAction"
# matcher = "Write|Edit"
# kind = "prompt"
# instruction = "The assistant wants to run {{tool_name}} with {{tool_input}}. Block anything touching credentials."
"#;

pub fn run_init(path: &Path) -> Result<()> {
    anyhow::ensure!(
        !path.exists(),
        "refusing to overwrite existing file {:?}",
        path
    );
    std::fs::write(path, STARTER_RULES)?;
    info!(?path, "Created starter rules file");
    println!("Created {}", path.display());
    Ok(())
}

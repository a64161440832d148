use super::EXIT_SUCCESS;
use clap::CommandFactory;
use std::path::Path;

pub fn run<C: CommandFactory>(dir: &Path) -> Result<u8, String> {
    std::fs::create_dir_all(dir).map_err(|e| format!("failed to create dir: {e}"))?;
    let cmd = C::command();
    render(&cmd, &dir.join("cfshift.1"))?;
    for sub in cmd.get_subcommands() {
        render(sub, &dir.join(format!("cfshift-{}.1", sub.get_name())))?;
    }
    println!("man pages written to {}", dir.display());
    Ok(EXIT_SUCCESS)
}

fn render(cmd: &clap::Command, path: &Path) -> Result<(), String> {
    let mut buf = Vec::new();
    clap_mangen::Man::new(cmd.clone())
        .render(&mut buf)
        .map_err(|e| format!("man page render failed: {e}"))?;
    std::fs::write(path, &buf).map_err(|e| format!("failed to write {}: {e}", path.display()))
}

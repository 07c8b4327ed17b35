// ============================================================================
// src/ui.rs – Operator-facing console output
// ============================================================================

use console::Style;

/// Styled progress printer. Diagnostics go through `tracing`; this is only
/// what an operator at the terminal reads.
#[derive(Debug, Clone)]
pub struct UX {
    pub quiet: bool,
    heading: Style,
    ok: Style,
    caution: Style,
    dim: Style,
}

impl UX {
    pub fn new(quiet: bool) -> Self {
        Self {
            quiet,
            heading: Style::new().cyan().bold(),
            ok: Style::new().green().bold(),
            caution: Style::new().yellow().bold(),
            dim: Style::new().dim(),
        }
    }

    pub fn phase(&self, title: &str) {
        if !self.quiet {
            println!("\n{}", self.heading.apply_to(format!("▸ {title}")));
        }
    }

    pub fn info(&self, msg: &str) {
        if !self.quiet {
            println!("  {msg}");
        }
    }

    pub fn note(&self, msg: &str) {
        if !self.quiet {
            println!("  {}", self.dim.apply_to(msg));
        }
    }

    pub fn success(&self, msg: &str) {
        if !self.quiet {
            println!("  {}", self.ok.apply_to(format!("✔ {msg}")));
        }
    }

    /// Warnings are printed even in quiet mode.
    pub fn warn(&self, msg: &str) {
        eprintln!("  {}", self.caution.apply_to(format!("! {msg}")));
    }

    /// Aligned key/value block.
    pub fn data_panel(&self, title: &str, rows: &[(&str, String)]) {
        if self.quiet {
            return;
        }
        println!("  {}", self.heading.apply_to(title));
        let width = rows.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
        for (key, value) in rows {
            println!("    {:<width$}  {}", key, value, width = width);
        }
    }
}

pub fn flag_label(enabled: bool) -> String {
    let label = if enabled { "yes" } else { "no" };
    label.to_string()
}

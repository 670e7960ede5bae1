//! Startup banner for interactive mode.

use std::io::IsTerminal;

/// ANSI true-color escape sequences for the banner palette.
struct Colors {
    accent: &'static str,
    title: &'static str,
    subtitle: &'static str,
    reset: &'static str,
}

const COLOR: Colors = Colors {
    accent: "\x1b[38;2;181;132;108m",
    title: "\x1b[1;38;2;220;165;120m",
    subtitle: "\x1b[38;2;100;100;120m",
    reset: "\x1b[0m",
};

const PLAIN: Colors = Colors { accent: "", title: "", subtitle: "", reset: "" };

/// Prints the startup banner to stdout.
///
/// Renders ANSI true-color when stdout is a terminal, falls back to plain
/// text otherwise.
pub fn print_banner() {
    let c = if std::io::stdout().is_terminal() { &COLOR } else { &PLAIN };
    let ac = c.accent;
    let tt = c.title;
    let st = c.subtitle;
    let r = c.reset;

    println!(
        r#"
{ac}  ┌─┐ ┌─┐{r}  {tt}bracket15{r}
{ac}  └┬┘ └┬┘{r}  {st}up/down bracket arbitrage{r}
{ac} ──┴───┴──{r}
"#
    );
}

use std::path::Path;

use console::Style;
use spikepursuit_core::pipeline::{BatchResult, SpikePursuitConfig};

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    method: Style,
    disabled: Style,
    path: Style,
    good: Style,
    bad: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            method: Style::new().green(),
            disabled: Style::new().dim().yellow(),
            path: Style::new().underlined(),
            good: Style::new().green(),
            bad: Style::new().red().bold(),
        }
    }
}

fn on_off(s: &Styles, enabled: bool) -> String {
    if enabled {
        s.method.apply_to("enabled").to_string()
    } else {
        s.disabled.apply_to("disabled").to_string()
    }
}

pub fn print_run_summary(
    video: &Path,
    dims: (usize, usize, usize),
    config: &SpikePursuitConfig,
    cells: usize,
    threads: usize,
    output: &Path,
) {
    let s = Styles::new();
    let (frames, height, width) = dims;

    println!();
    println!("  {}", s.title.apply_to("SpikePursuit"));
    println!("  {}", s.title.apply_to("\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}\u{2550}"));
    println!();

    println!("  {:<14}{}", s.label.apply_to("Input"), s.path.apply_to(video.display()));
    println!("  {:<14}{}", s.label.apply_to("Output"), s.path.apply_to(output.display()));
    println!(
        "  {:<14}{}",
        s.label.apply_to("Recording"),
        s.value.apply_to(format!(
            "{frames} frames of {width}x{height} at {} Hz",
            config.sample_rate
        ))
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Cells"),
        s.value.apply_to(format!("{cells} on {threads} threads"))
    );
    println!();

    println!("  {}", s.header.apply_to("Region"));
    println!(
        "    {:<14}{}",
        s.label.apply_to("Context"),
        s.value.apply_to(format!("{} px", config.context_size))
    );
    println!(
        "    {:<14}{}",
        s.label.apply_to("Censor"),
        s.value.apply_to(format!("{} px", config.censor_size))
    );
    println!(
        "    {:<14}{}",
        s.label.apply_to("Background"),
        s.value.apply_to(format!("{} components", config.n_pc_bg))
    );
    println!();

    println!("  {}", s.header.apply_to("Refinement"));
    println!(
        "    {:<14}{}",
        s.label.apply_to("Iterations"),
        s.value.apply_to(config.n_iter)
    );
    println!(
        "    {:<14}{}",
        s.label.apply_to("Drift tau"),
        s.value.apply_to(format!("{} s", config.tau_lp))
    );
    println!("    {:<14}{:?}", s.label.apply_to("Sigmas"), config.sigmas);
    if config.do_cross_val {
        println!(
            "    {:<14}{}",
            s.label.apply_to("Selection"),
            s.method.apply_to(format!("{}-fold cross-validation", config.cv_folds))
        );
    } else {
        println!(
            "    {:<14}{}",
            s.label.apply_to("Selection"),
            s.method.apply_to(format!(
                "fixed (sigma #{}, lambda #{})",
                config.sigma_index, config.lambda_index
            ))
        );
    }
    println!(
        "    {:<14}{}",
        s.label.apply_to("HP regress"),
        on_off(&s, config.high_pass_regression)
    );
    println!(
        "    {:<14}{}",
        s.label.apply_to("Global sub"),
        on_off(&s, config.do_global_subtract)
    );
    println!();
}

pub fn print_batch_summary(results: &BatchResult) {
    let s = Styles::new();

    println!();
    println!("  {}", s.header.apply_to("Results"));
    for (cell_id, result) in results {
        match result {
            Ok(record) => {
                let locality = if record.passed_locality_test {
                    s.good.apply_to("local").to_string()
                } else {
                    s.disabled.apply_to("not local").to_string()
                };
                println!(
                    "    {:<8}{} spikes, SNR {:.2}, {}",
                    s.label.apply_to(cell_id),
                    s.value.apply_to(record.spike_times.len()),
                    record.snr,
                    locality
                );
            }
            Err(failure) => {
                println!(
                    "    {:<8}{} {}",
                    s.label.apply_to(cell_id),
                    s.bad.apply_to("failed:"),
                    failure.message
                );
            }
        }
    }
    println!();
}

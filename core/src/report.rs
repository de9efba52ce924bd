use std::fmt::Write;

use hyperparams::Grid;

use crate::runner::TrainingRun;

pub fn format_run(run: &TrainingRun) -> String {
    let mut out = String::new();
    let title = match run.row {
        Some(row) => format!("{} (row {})", run.name, row),
        None => run.name.clone(),
    };
    writeln!(out, "== {} ==", title).ok();
    writeln!(out, "{}", run.config).ok();
    writeln!(out, "{:<6}{:>12}{:>12}", "epoch", "loss", "val_loss").ok();
    for (i, (loss, val_loss)) in run
        .history
        .loss
        .iter()
        .zip(&run.history.val_loss)
        .enumerate()
    {
        writeln!(out, "{:<6}{:>12.5}{:>12.5}", i + 1, loss, val_loss).ok();
    }
    writeln!(out, "test loss: {:.5}", run.test_loss).ok();
    writeln!(out, "training time: {:.2?}", run.elapsed).ok();
    write!(
        out,
        "saved: {}, {}",
        run.weights_path.display(),
        run.config_path.display()
    )
    .ok();
    out
}

pub fn print_runs(runs: &[TrainingRun]) {
    for run in runs {
        println!("{}\n", format_run(run));
    }
}

pub fn print_grid(grid: &Grid, show: bool) {
    println!("raw combinations: {}", grid.raw_len());
    println!("valid combinations: {}", grid.len());
    if show {
        for (i, row) in grid.iter().enumerate() {
            let values: Vec<String> = row.entries().into_iter().map(|(_, v)| v).collect();
            println!("{:>6}  {}", i, values.join("  "));
        }
    }
}

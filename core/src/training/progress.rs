use indicatif::{ProgressBar, ProgressStyle};
use std::error::Error;

pub struct TrainingProgressBar {
    bar: ProgressBar,
}

impl TrainingProgressBar {
    pub fn new(num_batches: usize, epoch: usize, epochs: usize) -> Result<Self, Box<dyn Error>> {
        let bar = ProgressBar::new(num_batches as u64);
        bar.set_style(ProgressStyle::default_bar().template(
            "{prefix} {spinner:.cyan} {pos}/{len} [{wide_bar:.cyan/blue}] {eta_precise} | {msg}",
        )?);
        bar.set_prefix(format!("epoch {}/{}", epoch, epochs));
        Ok(Self { bar })
    }

    pub fn update(&self, loss: f32) {
        self.bar.set_message(format!("loss: {:.5}", loss));
        self.bar.inc(1);
    }

    pub fn finish(&self, val_loss: f32, train_loss: f32) {
        self.bar
            .set_message(format!("val: {:.5}, loss: {:.5}", val_loss, train_loss));

        self.bar.finish();
    }
}

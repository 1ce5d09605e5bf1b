use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{Float64Array, Int64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

/// One simulated test run: a noisy elliptical cloud of (A, B) operating points.
struct Run {
    time: Vec<f64>,
    a: Vec<f64>,
    b: Vec<f64>,
    id: Vec<i64>,
}

fn generate_run(
    centre: (f64, f64),
    radii: (f64, f64),
    n: usize,
    first_id: i64,
    rng: &mut SimpleRng,
) -> Run {
    let mut run = Run {
        time: Vec::with_capacity(n),
        a: Vec::with_capacity(n),
        b: Vec::with_capacity(n),
        id: Vec::with_capacity(n),
    };
    for i in 0..n {
        let theta = rng.next_f64() * 2.0 * std::f64::consts::PI;
        let r = rng.next_f64().sqrt();
        run.time.push(i as f64 * 0.1);
        run.a.push(centre.0 + radii.0 * r * theta.cos() + rng.gauss(0.0, 0.02));
        run.b.push(centre.1 + radii.1 * r * theta.sin() + rng.gauss(0.0, 0.02));
        run.id.push(first_id + i as i64);
    }
    run
}

fn write_parquet(run: &Run, path: &Path) -> Result<()> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("measurement_id", DataType::Int64, false),
        Field::new("TIME", DataType::Float64, false),
        Field::new("A", DataType::Float64, false),
        Field::new("B", DataType::Float64, false),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Int64Array::from(run.id.clone())),
            Arc::new(Float64Array::from(run.time.clone())),
            Arc::new(Float64Array::from(run.a.clone())),
            Arc::new(Float64Array::from(run.b.clone())),
        ],
    )
    .context("creating record batch")?;

    let file = std::fs::File::create(path).context("creating output file")?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating writer")?;
    writer.write(&batch).context("writing batch")?;
    writer.close().context("closing writer")?;
    Ok(())
}

fn write_csv(run: &Run, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).context("creating output file")?;
    writer.write_record(["measurement_id", "TIME", "A", "B"])?;
    for i in 0..run.id.len() {
        writer.write_record([
            run.id[i].to_string(),
            run.time[i].to_string(),
            run.a[i].to_string(),
            run.b[i].to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let out_dir = std::env::args().nth(1).unwrap_or_else(|| "sample_data".to_string());
    let out_dir = Path::new(&out_dir);
    std::fs::create_dir_all(out_dir).context("creating output directory")?;

    let mut rng = SimpleRng::new(42);

    // (centre, radii, rows) per run; overlapping clouds so some runs fall
    // entirely inside the combined envelope.
    let runs = [
        ((0.0, 0.0), (1.0, 0.5), 200),
        ((0.5, 0.2), (0.8, 0.8), 150),
        ((0.1, 0.0), (0.2, 0.2), 100),
        ((-0.6, 0.4), (0.5, 0.3), 120),
    ];

    let mut next_id = 0;
    for (i, &(centre, radii, n)) in runs.iter().enumerate() {
        let run = generate_run(centre, radii, n, next_id, &mut rng);
        next_id += n as i64;

        let stem = format!("run_{i}");
        let (path, result) = if i % 2 == 0 {
            let path = out_dir.join(format!("{stem}.parquet"));
            let result = write_parquet(&run, &path);
            (path, result)
        } else {
            let path = out_dir.join(format!("{stem}.csv"));
            let result = write_csv(&run, &path);
            (path, result)
        };
        result.with_context(|| format!("writing {}", path.display()))?;
        log::info!("wrote {n} rows to {}", path.display());
    }

    println!(
        "Wrote {} runs ({next_id} rows) to {}",
        runs.len(),
        out_dir.display()
    );
    Ok(())
}

use std::sync::Arc;

use arrow::array::{Float64Array, StringArray};
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

struct LongRow {
    label: String,
    record_type: &'static str,
    element: String,
    value: f64,
}

/// One reading per element: true concentration plus instrument noise.
fn panel(
    rows: &mut Vec<LongRow>,
    label: &str,
    record_type: &'static str,
    elements: &[(&str, f64)],
    rng: &mut SimpleRng,
) {
    for &(element, conc) in elements {
        rows.push(LongRow {
            label: label.to_string(),
            record_type,
            element: element.to_string(),
            value: rng.gauss(conc, 0.01 + conc * 0.02),
        });
    }
}

fn main() {
    let mut rng = SimpleRng::new(42);

    let elements: Vec<(&str, f64)> = vec![
        ("Fe", 12.4),
        ("Cu", 0.82),
        ("Zn", 3.1),
        ("Mn", 0.45),
        ("Pb", 0.07),
    ];

    let mut rows: Vec<LongRow> = Vec::new();

    // Calibration block
    panel(
        &mut rows,
        "Cal Blank",
        "Blk",
        &elements.iter().map(|&(el, _)| (el, 0.0)).collect::<Vec<_>>(),
        &mut rng,
    );
    for (i, scale) in [0.1, 1.0, 10.0].into_iter().enumerate() {
        let std_panel: Vec<(&str, f64)> = elements.iter().map(|&(el, c)| (el, c * scale)).collect();
        panel(&mut rows, &format!("Std {}", i + 1), "Std", &std_panel, &mut rng);
    }

    // CRM check and routine samples
    panel(&mut rows, "CRM 2710a", "Samp", &elements, &mut rng);
    for i in 1..=8 {
        let sample_panel: Vec<(&str, f64)> = elements
            .iter()
            .map(|&(el, c)| (el, c * (0.2 + 1.6 * rng.next_f64())))
            .collect();
        panel(&mut rows, &format!("S-{i:03}"), "Samp", &sample_panel, &mut rng);
    }

    // S-004 re-run in full: two repeat sets under one label
    let rerun: Vec<(&str, f64)> = elements
        .iter()
        .map(|&(el, c)| (el, c * (0.2 + 1.6 * rng.next_f64())))
        .collect();
    panel(&mut rows, "S-004", "Samp", &rerun, &mut rng);

    // S-009 measured on two Fe wavelengths: merges onto one wide row
    let mut dup = vec![("Fe", 9.7), ("Fe_2", 9.7)];
    dup.extend(elements.iter().skip(1).copied());
    panel(&mut rows, "S-009", "Samp", &dup, &mut rng);

    // Build Arrow arrays
    let label_array = StringArray::from(
        rows.iter().map(|r| r.label.as_str()).collect::<Vec<_>>(),
    );
    let type_array = StringArray::from(
        rows.iter().map(|r| r.record_type).collect::<Vec<_>>(),
    );
    let element_array = StringArray::from(
        rows.iter().map(|r| r.element.as_str()).collect::<Vec<_>>(),
    );
    let value_array = Float64Array::from(rows.iter().map(|r| r.value).collect::<Vec<_>>());

    let schema = Arc::new(Schema::new(vec![
        Field::new("Solution Label", DataType::Utf8, false),
        Field::new("Type", DataType::Utf8, false),
        Field::new("Element", DataType::Utf8, false),
        Field::new("Corr Con", DataType::Float64, false),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(label_array),
            Arc::new(type_array),
            Arc::new(element_array),
            Arc::new(value_array),
        ],
    )
    .expect("Failed to create RecordBatch");

    // Write Parquet
    let output_path = "sample_run.parquet";
    let file = std::fs::File::create(output_path).expect("Failed to create output file");
    let mut writer = ArrowWriter::try_new(file, schema, None).expect("Failed to create writer");
    writer.write(&batch).expect("Failed to write batch");
    writer.close().expect("Failed to close writer");

    println!("Wrote {} readings to {output_path}", rows.len());
}

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;

use csv::{ReaderBuilder, WriterBuilder};
use ndarray::{s, Array2, ArrayView1, ArrayView2};

use crate::error::{McmcError, Result};
use crate::model::{ModelPrior, ModelState};
use crate::partition::EventPartition;

/// Columns that describe the model state, with their current values.
fn state_columns(state: &ModelState) -> Vec<(String, f64)> {
    let mut columns = vec![(
        "number_of_events".to_string(),
        state.partition().number_of_events() as f64,
    )];
    if let Some(c) = state.concentration().filter(|c| c.is_estimated()) {
        columns.push(("concentration".to_string(), c.value()));
    }
    if let Some(f) = state.shared_freq_1() {
        columns.push(("freq_1".to_string(), f.value()));
    }
    let partition = state.partition();
    for (i, c) in state.comparisons().iter().enumerate() {
        let label = c.label();
        columns.push((format!("root_height_{label}"), partition.height_of_comparison(i)));
        columns.push((format!("root_height_index_{label}"), partition.event_of(i) as f64));
        if c.sizes_collapsed() {
            columns.push((format!("pop_size_{label}"), c.population_size(0)));
        } else {
            for (p, name) in c.populations().iter().enumerate() {
                columns.push((format!("pop_size_{name}"), c.population_size(p)));
            }
            columns.push((format!("pop_size_root_{label}"), c.root_population_size()));
        }
        if let Some(f) = c.freq_1() {
            columns.push((format!("freq_1_{label}"), f.value()));
        }
        columns.push((format!("mutation_rate_{label}"), c.mutation_rate().value()));
    }
    columns
}

/// Column names of a state log, fixed for the lifetime of a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLayout {
    headers: Vec<String>,
}

impl LogLayout {
    pub fn for_state(state: &ModelState) -> Result<Self> {
        let mut headers = vec![
            "generation".to_string(),
            "ln_likelihood".to_string(),
            "ln_prior".to_string(),
        ];
        headers.extend(
            state
                .comparisons()
                .iter()
                .map(|c| format!("ln_likelihood_{}", c.label())),
        );
        headers.extend(
            state
                .comparisons()
                .iter()
                .map(|c| format!("ln_prior_{}", c.label())),
        );
        headers.extend(state_columns(state).into_iter().map(|(name, _)| name));

        let mut seen = HashSet::new();
        if let Some(dup) = headers.iter().find(|h| !seen.insert(h.as_str())) {
            return Err(McmcError::config(format!(
                "labels produce the state log column '{dup}' twice"
            )));
        }
        Ok(Self { headers })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

/// Appends sample rows to a state log.
pub struct StateLogWriter<W: Write> {
    writer: csv::Writer<W>,
    layout: LogLayout,
}

impl StateLogWriter<File> {
    /// Creates (or truncates) `path` and writes the header.
    pub fn create(path: impl AsRef<Path>, layout: LogLayout) -> Result<Self> {
        Self::from_writer(File::create(path)?, layout, true)
    }

    /// Opens an existing log for appending; no header is written.
    pub fn append(path: impl AsRef<Path>, layout: LogLayout) -> Result<Self> {
        let file = OpenOptions::new().append(true).open(path)?;
        Self::from_writer(file, layout, false)
    }
}

impl<W: Write> StateLogWriter<W> {
    pub fn from_writer(writer: W, layout: LogLayout, write_header: bool) -> Result<Self> {
        let mut writer = WriterBuilder::new().delimiter(b'\t').from_writer(writer);
        if write_header {
            writer.write_record(layout.headers())?;
        }
        Ok(Self { writer, layout })
    }

    pub fn layout(&self) -> &LogLayout {
        &self.layout
    }

    pub fn write_sample(
        &mut self,
        generation: usize,
        ln_likelihood: f64,
        ln_prior: f64,
        ln_likelihoods: &[f64],
        state: &ModelState,
    ) -> Result<()> {
        let mut row = Vec::with_capacity(self.layout.len());
        row.push(generation.to_string());
        row.push(ln_likelihood.to_string());
        row.push(ln_prior.to_string());
        row.extend(ln_likelihoods.iter().map(f64::to_string));
        row.extend(state.comparisons().iter().map(|c| c.ln_prior().to_string()));
        for (_, value) in state_columns(state) {
            row.push(value.to_string());
        }
        if row.len() != self.layout.len() {
            return Err(McmcError::Log(format!(
                "sample has {} columns but the log has {}",
                row.len(),
                self.layout.len()
            )));
        }
        self.writer.write_record(&row)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Flushes and returns the underlying writer.
    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| McmcError::Io(e.into_error()))
    }
}

/// A state log read back into memory.
#[derive(Debug, Clone)]
pub struct StateLogTable {
    pub headers: Vec<String>,
    /// One row per sample, one column per header.
    pub rows: Array2<f64>,
}

impl StateLogTable {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn column(&self, name: &str) -> Option<ArrayView1<'_, f64>> {
        self.column_index(name).map(|j| self.rows.column(j))
    }

    pub fn len(&self) -> usize {
        self.rows.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.nrows() == 0
    }

    /// Rows left after dropping the first `burnin` samples.
    pub fn after_burnin(&self, burnin: usize) -> ArrayView2<'_, f64> {
        let start = burnin.min(self.rows.nrows());
        self.rows.slice(s![start.., ..])
    }
}

pub fn read_state_log(path: impl AsRef<Path>) -> Result<StateLogTable> {
    let path = path.as_ref();
    read_state_log_from(File::open(path)?)
        .map_err(|e| match e {
            McmcError::Log(msg) => McmcError::Log(format!("{}: {msg}", path.display())),
            other => other,
        })
}

pub fn read_state_log_from<R: Read>(reader: R) -> Result<StateLogTable> {
    let mut rdr = ReaderBuilder::new().delimiter(b'\t').from_reader(reader);
    let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    if headers.is_empty() {
        return Err(McmcError::Log("state log has no header".into()));
    }
    let mut values = Vec::new();
    let mut n = 0;
    for record in rdr.records() {
        let record = record?;
        for (j, field) in record.iter().enumerate() {
            let v: f64 = field.trim().parse().map_err(|_| {
                McmcError::Log(format!(
                    "row {}: column '{}' holds '{field}', not a number",
                    n + 1,
                    headers[j]
                ))
            })?;
            values.push(v);
        }
        n += 1;
    }
    let rows = Array2::from_shape_vec((n, headers.len()), values)
        .map_err(|e| McmcError::Log(format!("ragged state log: {e}")))?;
    Ok(StateLogTable { headers, rows })
}

/// Sets `state` to the sample in `row` of `table` and returns its
/// generation. The table must have exactly the columns `state` would log.
pub fn restore_state(state: &mut ModelState, table: &StateLogTable, row: usize) -> Result<usize> {
    let layout = LogLayout::for_state(state)?;
    if table.headers != layout.headers() {
        return Err(McmcError::Log(
            "state log columns do not match the configured model".into(),
        ));
    }
    if row >= table.len() {
        return Err(McmcError::Log(format!(
            "state log has {} samples, cannot read sample {row}",
            table.len()
        )));
    }
    let values = table.rows.row(row);
    let get = |name: &str| -> Result<f64> {
        table
            .column_index(name)
            .map(|j| values[j])
            .ok_or_else(|| McmcError::Log(format!("state log has no column '{name}'")))
    };
    let as_index = |name: &str| -> Result<usize> {
        let v = get(name)?;
        if v.is_finite() && v >= 0.0 && v.fract() == 0.0 {
            Ok(v as usize)
        } else {
            Err(McmcError::Log(format!("column '{name}' holds {v}, not an index")))
        }
    };

    let generation = as_index("generation")?;

    let n = state.number_of_comparisons();
    let mut assignments = Vec::with_capacity(n);
    let mut heights: Vec<Option<f64>> = vec![None; n];
    for c in state.comparisons() {
        let label = c.label();
        let event = as_index(&format!("root_height_index_{label}"))?;
        let height = get(&format!("root_height_{label}"))?;
        let slot = heights.get_mut(event).ok_or_else(|| {
            McmcError::Log(format!("event index {event} of '{label}' is out of range"))
        })?;
        if slot.is_some_and(|h| h != height) {
            return Err(McmcError::Log(format!(
                "comparisons of event {event} disagree on its height"
            )));
        }
        *slot = Some(height);
        assignments.push(event);
    }
    let heights = heights.into_iter().map(|h| h.unwrap_or(f64::NAN)).collect();
    let partition = EventPartition::new(assignments, heights)
        .map_err(|e| McmcError::Log(format!("invalid partition in state log: {e}")))?;
    if partition.heights().iter().any(|&h| !(h > 0.0)) {
        return Err(McmcError::Log("state log holds a non-positive event height".into()));
    }
    if matches!(state.model_prior(), ModelPrior::Fixed)
        && partition.assignments() != state.partition().assignments()
    {
        return Err(McmcError::Log(
            "state log partition differs from the fixed event model".into(),
        ));
    }

    if state.concentration().is_some_and(|c| c.is_estimated()) {
        let v = get("concentration")?;
        if let Some(c) = state.concentration_mut() {
            c.set_value(v);
        }
    }
    if state.shared_freq_1().is_some_and(|f| f.is_estimated()) {
        let v = get("freq_1")?;
        if let Some(f) = state.shared_freq_1_mut() {
            f.set_value(v);
        }
    }
    for c in state.comparisons_mut() {
        let label = c.label().to_string();
        let size_columns: Vec<String> = if c.sizes_collapsed() {
            vec![format!("pop_size_{label}")]
        } else {
            c.populations()
                .iter()
                .map(|p| format!("pop_size_{p}"))
                .chain(std::iter::once(format!("pop_size_root_{label}")))
                .collect()
        };
        for (size, column) in c.population_sizes_mut().iter_mut().zip(&size_columns) {
            if size.is_estimated() {
                size.set_value(get(column)?);
            }
        }
        if c.freq_1().is_some_and(|f| f.is_estimated()) {
            let v = get(&format!("freq_1_{label}"))?;
            if let Some(f) = c.freq_1_mut() {
                f.set_value(v);
            }
        }
        if c.mutation_rate().is_estimated() {
            c.mutation_rate_mut()
                .set_value(get(&format!("mutation_rate_{label}"))?);
        }
    }
    *state.partition_mut() = partition;
    Ok(generation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::rng::RandomStream;

    const CONFIG: &str = r#"
event_time_prior:
    gamma_distribution: {shape: 2.0, scale: 0.5}
event_model_prior:
    dirichlet_process:
        parameters:
            concentration:
                value: 1.5
                estimate: true
                prior: {gamma_distribution: {shape: 2.0, scale: 1.0}}
global_comparison_settings:
    parameters:
        freq_1: {value: 0.5, estimate: true, prior: {beta_distribution: {alpha: 2.0, beta: 2.0}}}
comparisons:
- comparison: {label: p1, populations: [a, b]}
- comparison: {label: p2, populations: [c], equal_population_sizes: true}
"#;

    fn state(seed: u64) -> ModelState {
        let config = Config::from_yaml_str(CONFIG).unwrap();
        ModelState::from_config(&config, &mut RandomStream::new(seed)).unwrap()
    }

    #[test]
    fn layout_lists_columns_in_order() {
        let layout = LogLayout::for_state(&state(1)).unwrap();
        let expected = [
            "generation",
            "ln_likelihood",
            "ln_prior",
            "ln_likelihood_p1",
            "ln_likelihood_p2",
            "ln_prior_p1",
            "ln_prior_p2",
            "number_of_events",
            "concentration",
            "root_height_p1",
            "root_height_index_p1",
            "pop_size_a",
            "pop_size_b",
            "pop_size_root_p1",
            "freq_1_p1",
            "mutation_rate_p1",
            "root_height_p2",
            "root_height_index_p2",
            "pop_size_p2",
            "freq_1_p2",
            "mutation_rate_p2",
        ];
        assert_eq!(layout.headers(), expected);
    }

    #[test]
    fn colliding_labels_are_rejected() {
        // a population named like the root column of its own comparison
        let yaml = CONFIG.replace("populations: [a, b]", "populations: [a, root_p1]");
        let config = Config::from_yaml_str(&yaml).unwrap();
        let s = ModelState::from_config(&config, &mut RandomStream::new(1)).unwrap();
        assert!(matches!(LogLayout::for_state(&s), Err(McmcError::Config(_))));
    }

    #[test]
    fn written_sample_restores_exactly() {
        let mut original = state(7);
        original.comparisons_mut()[0].population_sizes_mut()[1].set_value(0.123456789012345);
        original.partition_mut().merge(1, 0);
        if let Some(c) = original.concentration_mut() {
            c.set_value(2.718281828459045);
        }
        let layout = LogLayout::for_state(&original).unwrap();
        let mut writer = StateLogWriter::from_writer(Vec::new(), layout, true).unwrap();
        writer
            .write_sample(300, -12.5, -3.25, &[-5.0, -7.5], &original)
            .unwrap();
        let bytes = writer.into_inner().unwrap();

        let table = read_state_log_from(bytes.as_slice()).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.column("ln_likelihood_p2").unwrap()[0], -7.5);
        for (i, label) in ["p1", "p2"].iter().enumerate() {
            let logged = table.column(&format!("ln_prior_{label}")).unwrap()[0];
            assert_eq!(logged, original.comparisons()[i].ln_prior());
        }

        let mut restored = state(99);
        let generation = restore_state(&mut restored, &table, 0).unwrap();
        assert_eq!(generation, 300);
        assert_eq!(restored.partition(), original.partition());
        assert_eq!(
            restored.comparisons()[0].population_size(1),
            0.123456789012345
        );
        assert_eq!(restored.concentration().unwrap().value(), 2.718281828459045);
        assert_eq!(restored.ln_prior(), original.ln_prior());
    }

    #[test]
    fn mismatched_headers_are_log_errors() {
        let table = read_state_log_from("generation\tln_likelihood\n0\t-1\n".as_bytes()).unwrap();
        let mut s = state(1);
        assert!(matches!(
            restore_state(&mut s, &table, 0),
            Err(McmcError::Log(_))
        ));
        assert!(matches!(
            read_state_log_from("generation\tx\n0\tabc\n".as_bytes()),
            Err(McmcError::Log(_))
        ));
    }
}

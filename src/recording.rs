//! ASCII recording backend writing the events of recording devices to text files.
//!
//! Each device keeps one file per virtual process, named
//! `{data_path}/{data_prefix}{label}-{gid}-{vp}.{extension}` where the device ID and the virtual
//! process are zero-padded to the number of digits of the node count and of the virtual process
//! count. Every file starts with a header line naming the columns, followed by one tab-separated
//! line per event: the sender, the time, then the recorded values of the device.
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::core::spikes::Spike;
use crate::core::utils::num_digits;
use crate::error::SNNError;
use crate::params::RecordingParams;

const HEADER_SENDER: &str = "# sender";
const TIME_MS_COLUMNS: &[&str] = &["time(ms)"];
const TIME_STEPS_COLUMNS: &[&str] = &["time(step)", "offset"];

/// A recording device as seen by the backend: its ID, its label and the names of the values
/// it records with every event.
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    pub gid: usize,
    pub label: String,
    pub double_value_names: Vec<String>,
    pub long_value_names: Vec<String>,
}

impl Device {
    /// A device recording events without values, e.g., a spike recorder.
    pub fn new(gid: usize, label: &str) -> Self {
        Device {
            gid,
            label: label.to_string(),
            double_value_names: vec![],
            long_value_names: vec![],
        }
    }

    pub fn with_double_values(mut self, names: &[&str]) -> Self {
        self.double_value_names = names.iter().map(|name| name.to_string()).collect();
        self
    }

    pub fn with_long_values(mut self, names: &[&str]) -> Self {
        self.long_value_names = names.iter().map(|name| name.to_string()).collect();
        self
    }
}

/// An enrolled device file; the writer is missing if the file could not be opened.
#[derive(Debug)]
struct DeviceFile {
    path: PathBuf,
    num_doubles: usize,
    num_longs: usize,
    writer: Option<BufWriter<File>>,
}

/// The ASCII recording backend.
#[derive(Debug)]
pub struct AsciiBackend {
    params: RecordingParams,
    data_path: PathBuf,
    overwrite_files: bool,
    resolution: f64,
    num_nodes: usize,
    /// For each virtual process, the files of the enrolled devices.
    files: Vec<HashMap<usize, DeviceFile>>,
}

impl AsciiBackend {
    pub fn new(
        params: RecordingParams,
        data_path: &Path,
        overwrite_files: bool,
        resolution: f64,
        num_nodes: usize,
        num_vps: usize,
    ) -> Self {
        AsciiBackend {
            params,
            data_path: data_path.to_path_buf(),
            overwrite_files,
            resolution,
            num_nodes,
            files: (0..num_vps.max(1)).map(|_| HashMap::new()).collect(),
        }
    }

    /// The number of virtual processes.
    pub fn num_vps(&self) -> usize {
        self.files.len()
    }

    /// The path of the file of a device on a virtual process.
    pub fn build_filename(&self, label: &str, gid: usize, vp: usize) -> PathBuf {
        let gid_digits = num_digits(self.num_nodes);
        let vp_digits = num_digits(self.num_vps());
        let basename = format!(
            "{}{}-{:0gw$}-{:0vw$}.{}",
            self.params.data_prefix,
            label,
            gid,
            vp,
            self.params.file_extension,
            gw = gid_digits,
            vw = vp_digits
        );
        self.data_path.join(basename)
    }

    /// Enroll a device on a virtual process: open its file and write the header.
    /// Enrolling an already enrolled device replaces its file.
    pub fn enroll(&mut self, device: &Device, vp: usize) -> Result<(), SNNError> {
        if vp >= self.num_vps() {
            return Err(SNNError::OutOfBounds(format!(
                "Virtual process {} of {}",
                vp,
                self.num_vps()
            )));
        }
        self.files[vp].remove(&device.gid);

        let path = self.build_filename(&device.label, device.gid, vp);
        let num_doubles = device.double_value_names.len();
        let num_longs = device.long_value_names.len();
        let failed = |path: PathBuf| DeviceFile {
            path,
            num_doubles,
            num_longs,
            writer: None,
        };

        if path.exists() && !self.overwrite_files {
            let msg = path.display().to_string();
            log::error!(
                "The device file '{}' exists already and will not be overwritten",
                msg
            );
            self.files[vp].insert(device.gid, failed(path));
            return Err(SNNError::FileExists(msg));
        }

        let file = match File::create(&path) {
            Ok(file) => file,
            Err(e) => {
                log::error!("I/O error while opening file '{}': {}", path.display(), e);
                self.files[vp].insert(device.gid, failed(path));
                return Err(SNNError::from(e));
            }
        };

        let time_columns = if self.params.time_in_steps {
            TIME_STEPS_COLUMNS
        } else {
            TIME_MS_COLUMNS
        };
        let mut writer = BufWriter::new(file);
        write!(writer, "{}", HEADER_SENDER)?;
        for name in time_columns.iter() {
            write!(writer, "\t{}", name)?;
        }
        for name in device
            .double_value_names
            .iter()
            .chain(device.long_value_names.iter())
        {
            write!(writer, "\t{}", name)?;
        }
        writeln!(writer)?;

        self.files[vp].insert(
            device.gid,
            DeviceFile {
                path,
                num_doubles,
                num_longs,
                writer: Some(writer),
            },
        );
        Ok(())
    }

    /// Write an event of `sender`, emitted during step `step`, to the file of a device.
    /// Events of devices that are not enrolled are ignored.
    pub fn write(
        &mut self,
        gid: usize,
        vp: usize,
        sender: usize,
        step: usize,
        double_values: &[f64],
        long_values: &[i64],
    ) -> Result<(), SNNError> {
        let file = match self.files.get_mut(vp).and_then(|files| files.get_mut(&gid)) {
            Some(file) => file,
            None => return Ok(()),
        };
        if double_values.len() != file.num_doubles || long_values.len() != file.num_longs {
            return Err(SNNError::InvalidParameters(format!(
                "Device {} records {} double and {} long values, got {} and {}",
                gid,
                file.num_doubles,
                file.num_longs,
                double_values.len(),
                long_values.len()
            )));
        }
        let writer = match file.writer.as_mut() {
            Some(writer) => writer,
            None => return Ok(()),
        };

        let precision = self.params.precision;
        // events are stamped at the end of the step they are emitted in
        if self.params.time_in_steps {
            write!(writer, "{}\t{}\t{:.*}", sender, step + 1, precision, 0.0)?;
        } else {
            let time = (step + 1) as f64 * self.resolution;
            write!(writer, "{}\t{:.*}", sender, precision, time)?;
        }
        for value in double_values.iter() {
            write!(writer, "\t{:.*}", precision, value)?;
        }
        for value in long_values.iter() {
            write!(writer, "\t{}", value)?;
        }
        writeln!(writer)?;
        Ok(())
    }

    /// Flush all files after a simulation run.
    pub fn post_run(&mut self) -> Result<(), SNNError> {
        for file in self.files.iter_mut().flat_map(|files| files.values_mut()) {
            if let Some(writer) = file.writer.as_mut() {
                writer.flush()?;
            }
        }
        Ok(())
    }

    /// Close all files; the devices stay enrolled but do not record anymore.
    pub fn cleanup(&mut self) -> Result<(), SNNError> {
        for file in self.files.iter_mut().flat_map(|files| files.values_mut()) {
            if let Some(mut writer) = file.writer.take() {
                writer.flush()?;
            }
        }
        Ok(())
    }

    /// The files of a device, sorted by virtual process.
    pub fn filenames(&self, gid: usize) -> Vec<PathBuf> {
        self.files
            .iter()
            .filter_map(|files| files.get(&gid).map(|file| file.path.clone()))
            .collect()
    }

    /// Read back all events recorded by a device, with their values.
    pub fn read_device(&self, gid: usize) -> Result<Vec<Record>, SNNError> {
        let mut records = vec![];
        for path in self.filenames(gid) {
            records.extend(read_records(&path, self.resolution)?.records);
        }
        Ok(records)
    }

    /// Read back all events recorded by a device as spikes.
    pub fn read_device_spikes(&self, gid: usize) -> Result<Vec<Spike>, SNNError> {
        Ok(self
            .read_device(gid)?
            .into_iter()
            .map(|record| Spike::new(record.sender, record.time))
            .collect())
    }
}

impl Drop for AsciiBackend {
    fn drop(&mut self) {
        if let Err(e) = self.cleanup() {
            log::error!("Failed to close the recording files: {}", e);
        }
    }
}

/// An event read back from a recording file, with its time in ms.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub sender: usize,
    pub time: f64,
    pub values: Vec<f64>,
}

/// The content of a recording file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Records {
    /// Names of the value columns, doubles first.
    pub value_names: Vec<String>,
    pub records: Vec<Record>,
}

fn parse_field<T: std::str::FromStr>(
    field: Option<&str>,
    path: &Path,
    line: usize,
) -> Result<T, SNNError> {
    field
        .and_then(|field| field.trim().parse().ok())
        .ok_or_else(|| {
            SNNError::IOError(format!("{}:{}: malformed record", path.display(), line + 1))
        })
}

/// Read the events of an ASCII recording file.
/// Files recorded in steps are converted to ms with the given resolution.
pub fn read_records(path: &Path, resolution: f64) -> Result<Records, SNNError> {
    let file =
        File::open(path).map_err(|e| SNNError::IOError(format!("{}: {}", path.display(), e)))?;
    let reader = BufReader::new(file);

    let mut in_steps = false;
    let mut content = Records::default();
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        if let Some(header) = line.strip_prefix(HEADER_SENDER) {
            let columns: Vec<&str> = header.split('\t').filter(|c| !c.is_empty()).collect();
            in_steps = columns.starts_with(TIME_STEPS_COLUMNS);
            let num_time_columns = if in_steps {
                TIME_STEPS_COLUMNS.len()
            } else {
                TIME_MS_COLUMNS.len()
            };
            content.value_names = columns
                .iter()
                .skip(num_time_columns)
                .map(|name| name.to_string())
                .collect();
            continue;
        }
        if line.starts_with('#') || line.trim().is_empty() {
            continue;
        }

        let mut fields = line.split('\t');
        let sender: usize = parse_field(fields.next(), path, n)?;
        let time = if in_steps {
            let step: usize = parse_field(fields.next(), path, n)?;
            let offset: f64 = parse_field(fields.next(), path, n)?;
            step as f64 * resolution - offset
        } else {
            parse_field(fields.next(), path, n)?
        };
        let values = (0..content.value_names.len())
            .map(|_| parse_field(fields.next(), path, n))
            .collect::<Result<Vec<f64>, _>>()?;
        content.records.push(Record {
            sender,
            time,
            values,
        });
    }
    Ok(content)
}

/// Read the spikes of an ASCII recording file.
pub fn read_spikes(path: &Path, resolution: f64) -> Result<Vec<Spike>, SNNError> {
    Ok(read_records(path, resolution)?
        .records
        .into_iter()
        .map(|record| Spike::new(record.sender, record.time))
        .collect())
}

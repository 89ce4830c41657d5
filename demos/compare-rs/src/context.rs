use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Where a run's description comes from and where its tables go.
///
/// Two entry points: a JSON run description on stdin with the scenario
/// under `input` (plus `seed`) and an `output` section, or a TOML scenario
/// file passed as the first argument (results then go to stdout, or to a
/// directory passed as the second argument).
pub struct RunContext<S> {
    pub scenario: S,
    pub seed: u64,
    output_dir: Option<PathBuf>,
}

impl<S: DeserializeOwned> RunContext<S> {
    pub fn load() -> Self {
        let mut args = std::env::args().skip(1);
        match args.next() {
            Some(path) => Self::from_toml_file(&path, args.next().map(PathBuf::from)),
            None => Self::from_stdin(),
        }
    }

    fn from_toml_file(path: &str, output_dir: Option<PathBuf>) -> Self {
        let raw = fs::read_to_string(path)
            .unwrap_or_else(|e| panic!("failed to read scenario file {path}: {e}"));
        let scenario: S =
            toml::from_str(&raw).unwrap_or_else(|e| panic!("failed to parse {path}: {e}"));
        let seed = toml::from_str::<toml::Value>(&raw)
            .ok()
            .and_then(|v| v.get("seed").and_then(|s| s.as_integer()))
            .map(|s| s as u64)
            .unwrap_or(0);
        RunContext {
            scenario,
            seed,
            output_dir,
        }
    }

    fn from_stdin() -> Self {
        let mut raw = String::new();
        io::stdin()
            .read_to_string(&mut raw)
            .expect("failed to read stdin");
        if raw.trim().is_empty() {
            eprintln!("Error: no scenario on stdin and no scenario file argument");
            std::process::exit(1);
        }
        let data: Value = serde_json::from_str(&raw).expect("failed to parse JSON from stdin");

        let mut input = data
            .get("input")
            .and_then(|v| v.as_object())
            .cloned()
            .unwrap_or_default();
        let seed = input.remove("seed").and_then(|v| v.as_u64()).unwrap_or(0);
        let scenario: S = serde_json::from_value(Value::Object(input))
            .expect("failed to deserialize scenario input");

        let output_dir = data
            .get("output")
            .filter(|o| o.get("spec").and_then(|v| v.as_str()) == Some("filesystem"))
            .and_then(|o| o.get("dir"))
            .and_then(|v| v.as_str())
            .map(PathBuf::from);

        RunContext {
            scenario,
            seed,
            output_dir,
        }
    }
}

impl<S> RunContext<S> {
    pub fn output_dir(&self) -> Option<&PathBuf> {
        self.output_dir.as_ref()
    }

    pub fn write_csv(&self, filename: &str, headers: &[&str], rows: &[Vec<String>]) {
        match &self.output_dir {
            Some(dir) => {
                fs::create_dir_all(dir).expect("failed to create output directory");
                let file =
                    fs::File::create(dir.join(filename)).expect("failed to create output file");
                write_records(csv::Writer::from_writer(file), headers, rows);
            }
            None => {
                write_records(csv::Writer::from_writer(io::stdout()), headers, rows);
            }
        }
    }
}

fn write_records<W: io::Write>(mut wtr: csv::Writer<W>, headers: &[&str], rows: &[Vec<String>]) {
    wtr.write_record(headers).unwrap();
    for row in rows {
        wtr.write_record(row).unwrap();
    }
    wtr.flush().unwrap();
}

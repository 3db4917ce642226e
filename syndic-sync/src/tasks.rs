//! The built-in processing tasks.
//!
//! Both tasks derive a twin of a CSV resource by handing the downloaded file
//! to a [`Convert`] implementation. Conversion itself runs out of process;
//! [`ExternalConverter`] shells out to whatever program the deployment
//! provides.

use std::path::{Path, PathBuf};
use std::process::Command;

use syndic_core::types::{Dataset, Resource};

use crate::error::{io_err, SyncError};
use crate::fetch;
use crate::postprocess::ProcessingTask;
use crate::reconcile::ResourceDescriptor;

/// Turns a downloaded source file into a derived artifact.
pub trait Convert {
    fn convert(&self, input: &Path, output: &Path) -> Result<(), SyncError>;
}

/// Runs `program <input> <output>` and expects exit status zero.
pub struct ExternalConverter {
    program: PathBuf,
}

impl ExternalConverter {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn label(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.display().to_string())
    }
}

impl Convert for ExternalConverter {
    fn convert(&self, input: &Path, output: &Path) -> Result<(), SyncError> {
        let result = Command::new(&self.program)
            .arg(input)
            .arg(output)
            .output()
            .map_err(|e| io_err(&self.program, e))?;
        if !result.status.success() {
            return Err(SyncError::Convert {
                task: self.label(),
                detail: format!(
                    "{} exited with {}: {}",
                    self.program.display(),
                    result.status,
                    String::from_utf8_lossy(&result.stderr).trim()
                ),
            });
        }
        Ok(())
    }
}

/// `name.csv` to `name.geojson`, for CSVs that declare their geometry
/// columns.
pub struct GeometryTwinTask<C> {
    http: reqwest::blocking::Client,
    converter: C,
}

impl<C> GeometryTwinTask<C> {
    pub fn new(http: reqwest::blocking::Client, converter: C) -> Self {
        Self { http, converter }
    }
}

impl<C: Convert> ProcessingTask for GeometryTwinTask<C> {
    fn task_id(&self) -> &str {
        "geojson"
    }

    fn eligible(&self, resource: &Resource) -> bool {
        resource.format == "CSV"
            && has_value(&resource.geo_lat_field)
            && has_value(&resource.geo_lon_field)
    }

    fn derive(
        &self,
        _dataset: &Dataset,
        resource: &Resource,
        workdir: &Path,
    ) -> Result<ResourceDescriptor, SyncError> {
        derive_twin(
            &self.http,
            &self.converter,
            resource,
            workdir,
            ".geojson",
            "GeoJSON",
        )
    }
}

/// `name.csv` to `name.xlsx`, for every CSV.
pub struct SpreadsheetTwinTask<C> {
    http: reqwest::blocking::Client,
    converter: C,
}

impl<C> SpreadsheetTwinTask<C> {
    pub fn new(http: reqwest::blocking::Client, converter: C) -> Self {
        Self { http, converter }
    }
}

impl<C: Convert> ProcessingTask for SpreadsheetTwinTask<C> {
    fn task_id(&self) -> &str {
        "xlsx"
    }

    fn eligible(&self, resource: &Resource) -> bool {
        resource.format == "CSV"
    }

    fn derive(
        &self,
        _dataset: &Dataset,
        resource: &Resource,
        workdir: &Path,
    ) -> Result<ResourceDescriptor, SyncError> {
        derive_twin(
            &self.http,
            &self.converter,
            resource,
            workdir,
            ".xlsx",
            "XLSX",
        )
    }
}

fn has_value(field: &Option<String>) -> bool {
    field.as_deref().is_some_and(|v| !v.is_empty())
}

fn derive_twin(
    http: &reqwest::blocking::Client,
    converter: &dyn Convert,
    resource: &Resource,
    workdir: &Path,
    suffix: &str,
    format: &str,
) -> Result<ResourceDescriptor, SyncError> {
    let input = workdir.join("source.csv");
    fetch::download(http, &resource.url, &input)?;

    let name = derived_name(&resource.name, suffix);
    let output = workdir.join(&name);
    converter.convert(&input, &output)?;

    Ok(ResourceDescriptor {
        name,
        format: format.to_owned(),
        description: resource.description.clone(),
        digest: None,
        upload: Some(output),
    })
}

fn derived_name(name: &str, suffix: &str) -> String {
    let stem = name.strip_suffix(".csv").unwrap_or(name);
    format!("{stem}{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::{BufRead, BufReader, Write as _};
    use std::net::TcpListener;
    use std::thread;

    use rstest::rstest;
    use tempfile::TempDir;

    fn csv_resource(lat: Option<&str>, lon: Option<&str>) -> Resource {
        Resource {
            name: "readings.csv".to_owned(),
            format: "CSV".to_owned(),
            geo_lat_field: lat.map(str::to_owned),
            geo_lon_field: lon.map(str::to_owned),
            ..Resource::default()
        }
    }

    fn noop_client() -> reqwest::blocking::Client {
        reqwest::blocking::Client::new()
    }

    #[test]
    fn geometry_twin_requires_both_geo_fields() {
        let task = GeometryTwinTask::new(noop_client(), ExternalConverter::new("cp"));
        assert!(task.eligible(&csv_resource(Some("lat"), Some("lon"))));
        assert!(!task.eligible(&csv_resource(Some("lat"), None)));
        assert!(!task.eligible(&csv_resource(None, Some("lon"))));
        assert!(!task.eligible(&csv_resource(Some(""), Some("lon"))));
    }

    #[test]
    fn geometry_twin_requires_csv_format() {
        let task = GeometryTwinTask::new(noop_client(), ExternalConverter::new("cp"));
        let mut resource = csv_resource(Some("lat"), Some("lon"));
        resource.format = "JSON".to_owned();
        assert!(!task.eligible(&resource));
    }

    #[test]
    fn spreadsheet_twin_takes_any_csv() {
        let task = SpreadsheetTwinTask::new(noop_client(), ExternalConverter::new("cp"));
        assert!(task.eligible(&csv_resource(None, None)));
        let mut resource = csv_resource(None, None);
        resource.format = "PDF".to_owned();
        assert!(!task.eligible(&resource));
    }

    #[rstest]
    #[case("readings.csv", ".geojson", "readings.geojson")]
    #[case("readings.csv", ".xlsx", "readings.xlsx")]
    #[case("no-extension", ".xlsx", "no-extension.xlsx")]
    fn derived_names_swap_the_suffix(
        #[case] name: &str,
        #[case] suffix: &str,
        #[case] expected: &str,
    ) {
        assert_eq!(derived_name(name, suffix), expected);
    }

    #[test]
    fn external_converter_copies_through_cp() {
        let dir = TempDir::new().expect("tempdir");
        let input = dir.path().join("in.csv");
        let output = dir.path().join("out.xlsx");
        std::fs::write(&input, "a,b\n1,2\n").expect("write input");

        ExternalConverter::new("cp")
            .convert(&input, &output)
            .expect("convert");

        assert_eq!(
            std::fs::read_to_string(&output).expect("read output"),
            "a,b\n1,2\n"
        );
    }

    #[test]
    fn external_converter_surfaces_nonzero_exit() {
        let dir = TempDir::new().expect("tempdir");
        let input = dir.path().join("in.csv");
        std::fs::write(&input, "a,b\n").expect("write input");

        let err = ExternalConverter::new("false")
            .convert(&input, &dir.path().join("out"))
            .unwrap_err();

        assert!(matches!(err, SyncError::Convert { .. }));
    }

    #[test]
    fn external_converter_reports_a_missing_program() {
        let err = ExternalConverter::new("/no/such/program")
            .convert(Path::new("in"), Path::new("out"))
            .unwrap_err();
        assert!(matches!(err, SyncError::Io { .. }));
    }

    #[test]
    fn derive_downloads_and_converts_into_the_workdir() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        thread::spawn(move || {
            let (stream, _) = listener.accept().expect("accept");
            let mut reader = BufReader::new(stream);
            let mut line = String::new();
            loop {
                line.clear();
                reader.read_line(&mut line).expect("read");
                if line == "\r\n" || line.is_empty() {
                    break;
                }
            }
            let body = "station,lat,lon\nalpha,1,2\n";
            let mut stream = reader.into_inner();
            stream
                .write_all(
                    format!(
                        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    )
                    .as_bytes(),
                )
                .expect("write");
        });

        let workdir = TempDir::new().expect("tempdir");
        let mut resource = csv_resource(Some("lat"), Some("lon"));
        resource.url = format!("http://{addr}/readings.csv");

        let task = GeometryTwinTask::new(noop_client(), ExternalConverter::new("cp"));
        let descriptor = task
            .derive(&Dataset::default(), &resource, workdir.path())
            .expect("derive");

        assert_eq!(descriptor.name, "readings.geojson");
        assert_eq!(descriptor.format, "GeoJSON");
        let upload = descriptor.upload.expect("upload path");
        assert_eq!(
            std::fs::read_to_string(upload).expect("read artifact"),
            "station,lat,lon\nalpha,1,2\n"
        );
    }
}

//! Filesystem-backed cohort storage as CSV.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::common::config::AppCfg;
use crate::common::error::{ScreenError, ScreenResult};

use super::domain::{AcuteClass, ChildRecord, CohortRepo, LabeledRecord, Labels, Sex};

/// Column header of the tabular cohort artefact.
pub const COHORT_HEADER: [&str; 10] = [
    "age",
    "sex",
    "weight",
    "height",
    "muac",
    "hb",
    "bmi",
    "acute_label",
    "stunting_flag",
    "anemia_flag",
];

/// Wire row. Field order is the column order.
#[derive(Debug, Serialize, Deserialize)]
struct CohortRow {
    age: u32,
    sex: u8,
    weight: f64,
    height: f64,
    muac: f64,
    hb: f64,
    bmi: f64,
    acute_label: u8,
    stunting_flag: u8,
    anemia_flag: u8,
}

impl From<&LabeledRecord> for CohortRow {
    fn from(value: &LabeledRecord) -> Self {
        let r = &value.record;
        Self {
            age: r.age,
            sex: r.sex.code(),
            weight: r.weight,
            height: r.height,
            muac: r.muac,
            hb: r.hb,
            bmi: r.bmi(),
            acute_label: value.labels.acute.into(),
            stunting_flag: u8::from(value.labels.stunting),
            anemia_flag: u8::from(value.labels.anemia),
        }
    }
}

impl TryFrom<CohortRow> for LabeledRecord {
    type Error = ScreenError;

    // the stored bmi column is ignored; ChildRecord derives it
    fn try_from(row: CohortRow) -> ScreenResult<Self> {
        Ok(LabeledRecord {
            record: ChildRecord {
                age: row.age,
                sex: Sex::try_from(row.sex)?,
                weight: row.weight,
                height: row.height,
                muac: row.muac,
                hb: row.hb,
            },
            labels: Labels {
                acute: AcuteClass::try_from(row.acute_label)?,
                stunting: flag(row.stunting_flag, "stunting_flag")?,
                anemia: flag(row.anemia_flag, "anemia_flag")?,
            },
        })
    }
}

fn flag(value: u8, column: &str) -> ScreenResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(ScreenError::schema(format!("{column} in {{0,1}}"), other)),
    }
}

/// Serialise a cohort as CSV (header included).
pub fn write_csv<W: Write>(writer: W, cohort: &[LabeledRecord]) -> ScreenResult<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for record in cohort {
        wtr.serialize(CohortRow::from(record))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Parse a CSV cohort, checking the header matches [`COHORT_HEADER`].
pub fn read_csv<R: Read>(reader: R) -> ScreenResult<Vec<LabeledRecord>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let headers = rdr.headers()?.clone();
    if !headers.iter().eq(COHORT_HEADER.iter().copied()) {
        return Err(ScreenError::schema(
            COHORT_HEADER.join(","),
            headers.iter().collect::<Vec<_>>().join(","),
        ));
    }
    rdr.deserialize::<CohortRow>()
        .map(|row| LabeledRecord::try_from(row?))
        .collect()
}

/// In-memory CSV bytes, used for fingerprints.
pub fn to_csv_bytes(cohort: &[LabeledRecord]) -> ScreenResult<Vec<u8>> {
    let mut buf = Vec::new();
    write_csv(&mut buf, cohort)?;
    Ok(buf)
}

/// Cohort repository rooted at `<data_root>/raw`.
pub struct FsCohortRepo {
    root: PathBuf,
}

impl FsCohortRepo {
    pub fn new(cfg: &AppCfg) -> Self {
        Self::at(Path::new(&cfg.data_root).join("raw"))
    }

    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn cohort_path(&self) -> PathBuf {
        self.root.join("cohort.csv")
    }
}

impl CohortRepo for FsCohortRepo {
    fn put_cohort(&self, cohort: &[LabeledRecord]) -> ScreenResult<()> {
        fs::create_dir_all(&self.root)?;
        let path = self.cohort_path();
        let file = fs::File::create(&path)?;
        write_csv(file, cohort)?;
        tracing::info!(ev = "cohort_saved", path = %path.display(), rows = cohort.len());
        Ok(())
    }

    fn get_cohort(&self) -> ScreenResult<Vec<LabeledRecord>> {
        let path = self.cohort_path();
        if !path.exists() {
            return Err(ScreenError::not_ready(format!(
                "cohort missing: {}",
                path.display()
            )));
        }
        read_csv(fs::File::open(&path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::service::CohortGenerator;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::tempdir;

    fn cohort(seed: u64, n: usize) -> Vec<LabeledRecord> {
        CohortGenerator::default().generate(n, &mut StdRng::seed_from_u64(seed))
    }

    #[test]
    fn header_matches_tabular_contract() {
        let bytes = to_csv_bytes(&cohort(1, 2)).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let first = text.lines().next().unwrap();
        assert_eq!(
            first,
            "age,sex,weight,height,muac,hb,bmi,acute_label,stunting_flag,anemia_flag"
        );
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn seeded_cohorts_are_byte_identical() {
        assert_eq!(
            to_csv_bytes(&cohort(42, 200)).unwrap(),
            to_csv_bytes(&cohort(42, 200)).unwrap()
        );
    }

    #[test]
    fn repo_persists_cohort() {
        let dir = tempdir().unwrap();
        let repo = FsCohortRepo::at(dir.path().join("raw"));
        let original = cohort(7, 25);
        repo.put_cohort(&original).unwrap();
        let loaded = repo.get_cohort().unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn stale_bmi_column_is_ignored() {
        let csv = "age,sex,weight,height,muac,hb,bmi,acute_label,stunting_flag,anemia_flag\n\
                   24,0,12.0,85.0,130.0,11.5,99.0,0,0,0\n";
        let rows = read_csv(csv.as_bytes()).unwrap();
        assert!((rows[0].record.bmi() - 16.609).abs() < 1e-3);
    }

    #[test]
    fn out_of_domain_labels_rejected() {
        let csv = "age,sex,weight,height,muac,hb,bmi,acute_label,stunting_flag,anemia_flag\n\
                   24,0,12.0,85.0,130.0,11.5,16.6,3,0,0\n";
        assert!(matches!(
            read_csv(csv.as_bytes()),
            Err(ScreenError::SchemaMismatch { .. })
        ));

        let csv = "age,sex,weight,height,muac,hb,bmi,acute_label,stunting_flag,anemia_flag\n\
                   24,0,12.0,85.0,130.0,11.5,16.6,0,2,0\n";
        assert!(read_csv(csv.as_bytes()).is_err());
    }

    #[test]
    fn reordered_header_rejected() {
        let csv = "sex,age,weight,height,muac,hb,bmi,acute_label,stunting_flag,anemia_flag\n";
        assert!(matches!(
            read_csv(csv.as_bytes()),
            Err(ScreenError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn missing_cohort_is_not_ready() {
        let dir = tempdir().unwrap();
        let repo = FsCohortRepo::at(dir.path());
        assert!(matches!(
            repo.get_cohort(),
            Err(ScreenError::MissingArtifact(_))
        ));
    }
}

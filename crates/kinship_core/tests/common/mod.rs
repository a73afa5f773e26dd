#![allow(dead_code)]

use flate2::write::GzEncoder;
use flate2::Compression;
use kinship_core::{import_into, Storage};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Three generations of one family, two nested places and a surname alias.
///
/// People come before the families they reference, and Anna cites a handle
/// that the archive never defines.
pub const FAMILY_ARCHIVE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<database xmlns="http://gramps-project.org/xml/1.7.1/">
  <header>
    <created date="2024-01-01" version="5.2.0"/>
  </header>
  <events>
    <event handle="_e1" change="1400000000" id="E0001">
      <type>Birth</type>
      <dateval val="1950-03-01"/>
      <place hlink="_pl2"/>
    </event>
    <event handle="_e2" change="1400000000" id="E0002">
      <type>Marriage</type>
      <place hlink="_pl2"/>
    </event>
  </events>
  <people>
    <person handle="_g1" change="1400000000" id="I0001">
      <gender>M</gender>
      <name type="Birth Name">
        <first>Henry</first>
        <surname>Smith</surname>
      </name>
      <name type="Also Known As">
        <first>Harry</first>
        <surname>Smith</surname>
      </name>
      <parentin hlink="_f1"/>
    </person>
    <person handle="_g2" change="1400000000" id="I0002">
      <gender>F</gender>
      <name type="Birth Name">
        <first>Mary</first>
        <surname>Jones</surname>
      </name>
      <parentin hlink="_f1"/>
    </person>
    <person handle="_p1" change="1400000000" id="I0003">
      <gender>M</gender>
      <name type="Birth Name">
        <first>John</first>
        <surname>Smith</surname>
      </name>
      <eventref hlink="_e2" role="Family"/>
      <childof hlink="_f1"/>
      <parentin hlink="_f2"/>
    </person>
    <person handle="_p2" change="1400000000" id="I0004">
      <gender>F</gender>
      <name type="Birth Name">
        <first>Jane</first>
        <surname>Brown</surname>
      </name>
      <eventref hlink="_e2" role="Family"/>
      <parentin hlink="_f2"/>
    </person>
    <person handle="_c1" change="1400000000" id="I0005">
      <gender>F</gender>
      <name type="Birth Name">
        <first>Anna</first>
        <surname>Smith</surname>
      </name>
      <eventref hlink="_e1" role="Primary"/>
      <childof hlink="_f2"/>
      <citationref hlink="_missing"/>
    </person>
    <person handle="_c2" change="1400000000" id="I0006">
      <gender>M</gender>
      <name type="Birth Name">
        <first>Peter</first>
        <surname>Smyth</surname>
      </name>
      <childof hlink="_f2"/>
    </person>
  </people>
  <families>
    <family handle="_f1" change="1400000000" id="F0001">
      <rel type="Married"/>
      <father hlink="_g1"/>
      <mother hlink="_g2"/>
      <childref hlink="_p1"/>
    </family>
    <family handle="_f2" change="1400000000" id="F0002">
      <rel type="Married"/>
      <father hlink="_p1"/>
      <mother hlink="_p2"/>
      <eventref hlink="_e2" role="Family"/>
      <childref hlink="_c1"/>
      <childref hlink="_c2"/>
    </family>
  </families>
  <places>
    <placeobj handle="_pl1" change="1400000000" id="P0001" type="Country">
      <ptitle>Ukraine</ptitle>
    </placeobj>
    <placeobj handle="_pl2" change="1400000000" id="P0002" type="City">
      <ptitle>Kyiv</ptitle>
      <coord long="30°31'24&quot;E" lat="50°27'00&quot;N"/>
      <placeref hlink="_pl1"/>
    </placeobj>
  </places>
  <namemaps>
    <map type="group_as" key="Smyth" value="Smith"/>
  </namemaps>
</database>
"#;

/// Writes `markup` gzip-compressed into `dir`.
pub fn write_gzip_archive(dir: &Path, markup: &str) -> PathBuf {
    let path = dir.join("tree.gramps");
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(markup.as_bytes()).unwrap();
    std::fs::write(&path, encoder.finish().unwrap()).unwrap();
    path
}

/// Imports [`FAMILY_ARCHIVE`] into a fresh store; keep the dir alive while querying.
pub fn imported_family() -> (TempDir, Storage) {
    let dir = tempfile::tempdir().unwrap();
    let archive = write_gzip_archive(dir.path(), FAMILY_ARCHIVE);
    let mut storage = Storage::open(dir.path().join("store"));
    import_into(&mut storage, &archive).unwrap();
    (dir, storage)
}

pub fn ids<'a>(views: impl IntoIterator<Item = kinship_core::EntityView<'a>>) -> Vec<String> {
    views.into_iter().map(|view| view.id().to_string()).collect()
}

use media_migrate::{LogLevel, load_config_from_xml_path};
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

#[test]
fn reads_groups_exclusions_and_scalars() {
    let td = tempdir().unwrap();
    let base = fs::canonicalize(td.path()).unwrap();
    let cfg_path = base.join("config.xml");
    let xml = r#"<config>
  <group>
    <source>/srv/incoming/tv</source>
    <source>/srv/incoming/movies</source>
    <destination>/mnt/vol1/media</destination>
    <destination>/mnt/vol2/media</destination>
  </group>
  <group>
    <source>/srv/incoming/music</source>
    <destination>/mnt/vol3/music</destination>
  </group>
  <exclude_extension>.nfo</exclude_extension>
  <exclude_extension>.part</exclude_extension>
  <headroom>2G</headroom>
  <workers> 4 </workers>
  <log_level>info</log_level>
  <preserve_metadata>false</preserve_metadata>
  <prune_empty_dirs>true</prune_empty_dirs>
  <residual_report_limit>3</residual_report_limit>
</config>"#;
    fs::write(&cfg_path, xml).unwrap();

    let cfg = load_config_from_xml_path(&cfg_path).expect("load config");
    assert_eq!(cfg.groups.len(), 2);
    assert_eq!(
        cfg.groups[0].destinations,
        vec![PathBuf::from("/mnt/vol1/media"), PathBuf::from("/mnt/vol2/media")]
    );
    assert_eq!(cfg.groups[1].sources, vec![PathBuf::from("/srv/incoming/music")]);
    assert_eq!(cfg.headroom_bytes, 2 * 1024 * 1024 * 1024);
    assert_eq!(cfg.workers, 4);
    assert_eq!(cfg.log_level, LogLevel::Info);
    assert!(!cfg.preserve_metadata);
    assert!(cfg.prune_empty_dirs);
    assert_eq!(cfg.residual_report_limit, 3);

    // The extension list was replaced; names keep their defaults.
    assert!(cfg.exclusions.is_excluded(&PathBuf::from("/x/movie.nfo")));
    assert!(!cfg.exclusions.is_excluded(&PathBuf::from("/x/movie.srt")));
    assert!(cfg.exclusions.is_excluded(&PathBuf::from("/x/Thumbs.db")));
}

#[test]
fn unknown_element_is_rejected() {
    let td = tempdir().unwrap();
    let cfg_path = td.path().join("config.xml");
    fs::write(&cfg_path, "<config><download_base>/x</download_base></config>").unwrap();
    let err = load_config_from_xml_path(&cfg_path).unwrap_err();
    assert!(format!("{err:#}").contains("parse config xml"), "{err:#}");
}

#[test]
fn bad_log_level_is_rejected() {
    let td = tempdir().unwrap();
    let cfg_path = td.path().join("config.xml");
    fs::write(&cfg_path, "<config><log_level>chatty</log_level></config>").unwrap();
    assert!(load_config_from_xml_path(&cfg_path).is_err());
}

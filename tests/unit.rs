use snapcube::manifest::{build, parse, serialize};
use snapcube::sniff::{SNIFF_LEN, classify, has_binary_extension};
use snapcube::{
    BinaryDetection, Encoding, Entry, ErrorKind, Manifest, Mode, Platform, Record,
    SourceDescriptor, codec, default_destination,
};
use std::path::{Path, PathBuf};

#[test]
fn test_nul_byte_is_binary() {
    assert!(classify("data", &[b'a', 0, b'b'], BinaryDetection::Simple));
    assert!(classify("data", &[b'a', 0, b'b'], BinaryDetection::Accurate));
    assert!(!classify("notes.txt", b"plain text\n", BinaryDetection::Simple));
}

#[test]
fn test_invalid_utf8_beyond_prefix_is_binary() {
    let mut bytes = vec![b'a'; SNIFF_LEN + 10];
    bytes.push(0xff);
    assert!(classify("late", &bytes, BinaryDetection::Simple));
}

#[test]
fn test_extension_fast_path() {
    assert!(has_binary_extension("logo.PNG"));
    assert!(has_binary_extension("archive.tar.gz"));
    assert!(!has_binary_extension("main.rs"));
    assert!(!has_binary_extension(".png"));
    assert!(classify("image.jpg", b"looks like text", BinaryDetection::Simple));
}

#[test]
fn test_invalid_utf8_is_binary() {
    assert!(classify("latin1.txt", &[0x63, 0x61, 0x66, 0xe9], BinaryDetection::Simple));
}

#[test]
fn test_codec_binary_roundtrip() {
    let bytes = vec![0u8, 159, 146, 150, 255, 10];
    let (content, encoding) = codec::encode(bytes.clone(), true);
    assert_eq!(encoding, Encoding::Base64);
    assert_eq!(codec::decode(&content, encoding).unwrap(), bytes);
}

#[test]
fn test_codec_text_verbatim() {
    let (content, encoding) = codec::encode("héllo\n".as_bytes().to_vec(), false);
    assert_eq!(encoding, Encoding::Utf8);
    assert_eq!(content, "héllo\n");
}

#[test]
fn test_codec_promotes_invalid_text() {
    let (_, encoding) = codec::encode(vec![0xc3, 0x28], false);
    assert_eq!(encoding, Encoding::Base64);
}

#[test]
fn test_codec_rejects_bad_base64() {
    let err = codec::decode("***not base64***", Encoding::Base64).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CorruptManifest);
}

#[test]
fn test_entry_bytes_reports_path() {
    let entry = Entry {
        file_name: "a.bin".into(),
        file_path: "root/dir".into(),
        content: "%%%".into(),
        is_binary: true,
        encoding: Encoding::Base64,
    };
    let err = entry.bytes().unwrap_err();
    assert!(err.to_string().contains("root/dir/a.bin"));
}

#[test]
fn test_parse_remote_descriptor() {
    let source: SourceDescriptor = "github:octocat/hello-world@main".parse().unwrap();
    match source {
        SourceDescriptor::Remote(repo) => {
            assert_eq!(repo.platform, Platform::GitHub);
            assert_eq!(repo.owner, "octocat");
            assert_eq!(repo.repo, "hello-world");
            assert_eq!(repo.reference.as_deref(), Some("main"));
            assert!(repo.token.is_none());
        }
        other => panic!("expected remote, got {:?}", other),
    }
}

#[test]
fn test_parse_gitlab_subgroup_without_ref() {
    let repo = SourceDescriptor::parse_remote("gitlab:group/sub/project").unwrap();
    assert_eq!(repo.platform, Platform::GitLab);
    assert_eq!(repo.owner, "group/sub");
    assert_eq!(repo.repo, "project");
    assert!(repo.reference.is_none());
    let source = SourceDescriptor::Remote(repo);
    assert_eq!(source.default_output_name("project"), "group_sub_project.snapcube.json");
}

#[test]
fn test_parse_rejects_malformed_descriptors() {
    for bad in ["github:octocat", "github:/repo", "github:owner/@main", "github:a/b/c", "bitbucket:a/b"] {
        let err = SourceDescriptor::parse_remote(bad).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSource, "{}", bad);
    }
    assert!("".parse::<SourceDescriptor>().is_err());
}

#[test]
fn test_local_paths_parse_as_local() {
    let source: SourceDescriptor = "./my-project".parse().unwrap();
    assert_eq!(source, SourceDescriptor::Local(PathBuf::from("./my-project")));
    assert_eq!(source.default_output_name("my-project"), "my-project.snapcube.json");
}

#[test]
fn test_token_redacted_in_debug() {
    let repo = SourceDescriptor::parse_remote("github:a/b")
        .unwrap()
        .with_token(Some("ghp_secret".into()));
    assert!(!format!("{:?}", repo).contains("ghp_secret"));
}

fn text_entry(dir: &str, name: &str) -> Entry {
    Entry::from_bytes(name, dir, name.as_bytes().to_vec(), false)
}

#[test]
fn test_build_sorts_by_full_path() {
    let records = vec![
        Record::Entry(text_entry("p/src", "main.rs")),
        Record::Entry(text_entry("p", "b.txt")),
        Record::Entry(text_entry("p", "a.txt")),
        Record::Entry(text_entry("p", "a.txt")),
    ];
    let manifest = build(records, Mode::Full);
    assert_eq!(manifest.paths(), vec!["p/a.txt", "p/b.txt", "p/src/main.rs"]);
}

#[test]
fn test_structure_only_serializes_plain_paths() {
    let records = vec![
        Record::Path("p/z.txt".into()),
        Record::Path("p/a/b.txt".into()),
    ];
    let manifest = build(records, Mode::StructureOnly);
    let json = String::from_utf8(serialize(&manifest, false).unwrap()).unwrap();
    assert_eq!(json, r#"["p/a/b.txt","p/z.txt"]"#);
}

#[test]
fn test_entry_json_shape() {
    let manifest = build(vec![Record::Entry(text_entry("p", "a.txt"))], Mode::Full);
    let json = String::from_utf8(serialize(&manifest, false).unwrap()).unwrap();
    assert_eq!(
        json,
        r#"[{"fileName":"a.txt","filePath":"p","content":"a.txt","isBinary":false,"encoding":"utf-8"}]"#
    );
    assert_eq!(parse(json.as_bytes()).unwrap(), manifest);
}

#[test]
fn test_ignore_binaries_build_drops_binary_entries() {
    let binary = Entry::from_bytes("x.bin", "p", vec![0, 1, 2], true);
    let manifest = build(
        vec![Record::Entry(binary), Record::Entry(text_entry("p", "t.txt"))],
        Mode::IgnoreBinaries,
    );
    assert_eq!(manifest.paths(), vec!["p/t.txt"]);
}

#[test]
fn test_parse_distinguishes_manifest_shapes() {
    assert!(parse(br#"["p/a.txt"]"#).unwrap().is_structure_only());
    assert_eq!(parse(b"[]").unwrap(), Manifest::Entries(Vec::new()));
    let err = parse(b"{not json").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CorruptManifest);
}

#[test]
fn test_default_destination_strips_manifest_suffix() {
    assert_eq!(
        default_destination(Path::new("out/my-project.snapcube.json")),
        PathBuf::from("my-project")
    );
    assert_eq!(default_destination(Path::new("layout.json")), PathBuf::from("layout"));
    assert_eq!(default_destination(Path::new("notes.txt")), PathBuf::from("notes.txt"));
    assert_eq!(default_destination(Path::new(".snapcube.json")), PathBuf::from(".snapcube.json"));
}

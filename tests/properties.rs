//! Round-trip properties over randomly generated values.

use proptest::prelude::*;

use git_odb::{varint, Author, Blob, GitMode, Object, PersonTime, Sha1, Stream, Tree, TreeEntry};

/// Encodes a value in the pack variable-size format.
fn varint_encode(mut value: u64) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if value == 0 {
            return out;
        }
    }
}

fn mode_strategy() -> impl Strategy<Value = GitMode> {
    prop_oneof![
        Just(GitMode::REGULAR | GitMode::PERM_READ_WRITE),
        Just(GitMode::REGULAR | GitMode::PERM_GROUP_WRITE),
        Just(GitMode::REGULAR | GitMode::PERM_EXECUTABLE),
        Just(GitMode::DIR),
        Just(GitMode::SYMLINK),
        Just(GitMode::GITLINK),
    ]
}

fn entry_strategy() -> impl Strategy<Value = TreeEntry> {
    (mode_strategy(), "[a-zA-Z0-9._-]{1,12}", any::<[u8; 20]>()).prop_map(
        |(mode, name, sha)| TreeEntry::new(mode, name, Sha1::new(sha)).unwrap(),
    )
}

proptest! {
    #[test]
    fn sha1_hex_round_trips(bytes in any::<[u8; 20]>()) {
        let sha = Sha1::new(bytes);
        let hex = sha.to_string();
        prop_assert_eq!(hex.len(), 40);
        prop_assert_eq!(Sha1::from_hex(&hex).unwrap(), sha);
    }

    #[test]
    fn varint_round_trips(value in any::<u64>()) {
        let encoded = varint_encode(value);
        let (decoded, consumed) = varint::decode(&encoded).unwrap();
        prop_assert_eq!(decoded, value);
        prop_assert_eq!(consumed, encoded.len());
    }

    #[test]
    fn varint_ignores_trailing_bytes(value in any::<u64>(), trailer in proptest::collection::vec(any::<u8>(), 0..16)) {
        let mut encoded = varint_encode(value);
        let expected_len = encoded.len();
        encoded.extend_from_slice(&trailer);
        let (decoded, consumed) = varint::decode(&encoded).unwrap();
        prop_assert_eq!(decoded, value);
        prop_assert_eq!(consumed, expected_len);
    }

    #[test]
    fn blob_stream_round_trips(content in proptest::collection::vec(any::<u8>(), 0..512)) {
        let stream = Stream::new(Blob::new(content).into());
        let decoded = Stream::decode(stream.bytes()).unwrap();
        prop_assert_eq!(decoded.object(), stream.object());
        prop_assert_eq!(decoded.hash(), stream.hash());
    }

    #[test]
    fn tree_entries_sort_regardless_of_input_order(
        entries in proptest::collection::vec(entry_strategy(), 0..16)
    ) {
        let tree = Tree::new(entries);
        let names: Vec<&[u8]> = tree.entries().iter().map(|e| e.name().as_bytes()).collect();
        prop_assert!(names.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn tree_stream_round_trips(
        entries in proptest::collection::vec(entry_strategy(), 0..16)
    ) {
        let tree: Object = Tree::new(entries).into();
        let stream = Stream::new(tree);
        let decoded = Stream::decode(stream.bytes()).unwrap();
        prop_assert_eq!(decoded.object(), stream.object());
        prop_assert_eq!(decoded.hash(), stream.hash());
    }

    #[test]
    fn person_time_round_trips(
        name in "[a-zA-Z][a-zA-Z ]{0,20}[a-zA-Z]",
        email in "[a-z]{1,10}@[a-z]{1,10}\\.[a-z]{2,3}",
        secs in -1_000_000_000i64..4_000_000_000i64,
        offset_minutes in -14 * 60..14 * 60,
    ) {
        let original = PersonTime::new(
            Author::new(name, email).unwrap(),
            secs,
            offset_minutes * 60,
        );
        let parsed = PersonTime::parse(&original.to_string()).unwrap();
        prop_assert_eq!(&parsed, &original);
        prop_assert_eq!(parsed.to_string(), original.to_string());
    }
}

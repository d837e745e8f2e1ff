use openedge_sql_middleware::extents::{self, ExtentValue};
use openedge_sql_middleware::RowValues;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const ALPHABET: &[char] = &['a', 'B', '7', ' ', ';', '~', 'é', '%', '\''];

fn random_element(rng: &mut ChaCha8Rng) -> String {
    let len = rng.random_range(0..6);
    (0..len)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())])
        .collect()
}

#[test]
fn random_extents_survive_the_text_column() {
    let mut rng = ChaCha8Rng::seed_from_u64(0x0E_DB);
    for _ in 0..500 {
        // The empty extent shares its text with a single empty element.
        let count = rng.random_range(1..8);
        let values: Vec<String> = (0..count).map(|_| random_element(&mut rng)).collect();

        let text = extents::encode(&values);
        assert_eq!(extents::decode(&text), values, "encoded as {text:?}");
    }
}

#[test]
fn extent_value_through_row_values() {
    let extent = ExtentValue::new(vec!["Mon;Tue".into(), "~".into(), String::new()]);
    let stored = RowValues::from(extent.clone());
    assert_eq!(stored, RowValues::Text("Mon~;Tue;~~;".into()));
    assert_eq!(ExtentValue::from_row_value(&stored), Some(extent));
    assert_eq!(ExtentValue::from_row_value(&RowValues::Int(3)), None);
}

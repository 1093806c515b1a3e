// Reads the house results feed published by the New York Times.
//
// The feed nests candidates within races. It is flattened to one row per
// candidate so that it can be shaped like any other source.

use crate::atlas::io_common::RawTable;
use crate::atlas::*;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct NytCandidate {
    party_id: String,
    #[serde(default)]
    votes: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct NytRace {
    state_id: String,
    seat: JSValue,
    leader_party_id: Option<String>,
    #[serde(default)]
    candidates: Vec<NytCandidate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct NytData {
    races: Vec<NytRace>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct NytFeed {
    data: NytData,
}

const NYT_COLUMNS: [&str; 5] = ["state_id", "seat", "leader_party_id", "party_id", "votes"];

fn seat_to_string(seat: &JSValue) -> String {
    match seat {
        JSValue::String(s) => s.clone(),
        JSValue::Number(n) => n.to_string(),
        _ => "".to_string(),
    }
}

pub fn read_nyt_house(path: &str) -> AtlasResult<RawTable> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let feed: NytFeed = serde_json::from_str(&contents).context(ParsingJsonSnafu { path })?;
    debug!("read_nyt_house: {}: {} races", path, feed.data.races.len());

    let mut rows: Vec<(usize, Vec<String>)> = Vec::new();
    for (idx, race) in feed.data.races.iter().enumerate() {
        let seat = seat_to_string(&race.seat);
        let leader = race.leader_party_id.clone().unwrap_or_default();
        // A race without candidates still yields a row, so that its leader joins.
        if race.candidates.is_empty() {
            warn!(
                "read_nyt_house: race {} {} has no candidates",
                race.state_id, seat
            );
            rows.push((
                idx + 1,
                vec![
                    race.state_id.clone(),
                    seat.clone(),
                    leader.clone(),
                    "".to_string(),
                    "".to_string(),
                ],
            ));
        }
        for c in race.candidates.iter() {
            rows.push((
                idx + 1,
                vec![
                    race.state_id.clone(),
                    seat.clone(),
                    leader.clone(),
                    c.party_id.clone(),
                    c.votes.to_string(),
                ],
            ));
        }
    }
    Ok(RawTable {
        path: path.to_string(),
        header: NYT_COLUMNS.iter().map(|s| s.to_string()).collect(),
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattens_races() {
        let path: PathBuf = [env!("CARGO_MANIFEST_DIR"), "tests", "data", "house.json"]
            .iter()
            .collect();
        let raw = read_nyt_house(path.display().to_string().as_str()).unwrap();
        assert_eq!(raw.header[3], "party_id");
        let first = &raw.rows[0].1;
        assert_eq!(first[0], "NY");
        assert_eq!(first[1], "1");
        assert_eq!(first[2], "republican");
        assert!(raw.rows.iter().all(|(_, r)| r.len() == 5));
        let empty: Vec<&Vec<String>> = raw
            .rows
            .iter()
            .filter(|(_, r)| r[0] == "NY" && r[1] == "3")
            .map(|(_, r)| r)
            .collect();
        assert_eq!(empty.len(), 1);
        assert_eq!(empty[0][2], "");
        assert_eq!(empty[0][3], "");
        assert_eq!(empty[0][4], "");
    }
}

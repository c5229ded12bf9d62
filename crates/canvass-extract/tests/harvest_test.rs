use async_trait::async_trait;
use canvass_extract::{ExtractError, Harvester, RaceFamily};
use canvass_fetch::{FetchError, FetchedPage, HostClass, PageSource};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Serves canned pages by URL; anything else is a 404.
#[derive(Default)]
struct CannedWiki {
    pages: HashMap<String, String>,
    requested: Mutex<Vec<(String, HostClass)>>,
}

impl CannedWiki {
    fn with(mut self, path: &str, body: &str) -> Self {
        self.pages
            .insert(format!("https://en.wikipedia.org{path}"), body.to_string());
        self
    }

    fn requested(&self) -> Vec<(String, HostClass)> {
        self.requested.lock().expect("lock").clone()
    }
}

#[async_trait]
impl PageSource for CannedWiki {
    async fn fetch(&self, url: &str, class: HostClass) -> canvass_fetch::Result<FetchedPage> {
        self.requested
            .lock()
            .expect("lock")
            .push((url.to_string(), class));
        match self.pages.get(url) {
            Some(body) => Ok(FetchedPage {
                url: url.to_string(),
                status: 200,
                body: body.clone(),
            }),
            None => Err(FetchError::FetchFailed {
                url: url.to_string(),
                status: Some(404),
                reason: "Not Found".to_string(),
            }),
        }
    }
}

fn statewide_page(caption: &str, winner: &str, loser: &str) -> String {
    format!(
        r#"<html><body>
          <table class="wikitable plainrowheaders"><caption>{caption}</caption>
            <tr class="vcard"><td></td><td class="org">Republican</td><td class="fn"><b>{winner}</b></td><td>1</td><td>55.0</td></tr>
            <tr class="vcard"><td></td><td class="org">Democratic</td><td class="fn">{loser}</td><td>1</td><td>45.0</td></tr>
          </table>
        </body></html>"#
    )
}

#[tokio::test]
async fn test_missing_index_uses_fallback() {
    let wiki = Arc::new(
        CannedWiki::default()
            .with(
                "/wiki/2024_United_States_gubernatorial_elections",
                r#"<body>
                  <a href="/wiki/2024_Montana_gubernatorial_election">MT governor</a>
                  <a href="/wiki/2024_Montana_Attorney_General_election">MT AG</a>
                </body>"#,
            )
            .with(
                "/wiki/2024_Montana_Attorney_General_election",
                &statewide_page("2024 Montana Attorney General election", "Austin Knudsen", "Ben Alke"),
            ),
    );
    let harvester = Harvester::new(wiki.clone());

    let results = harvester
        .harvest(RaceFamily::AttorneyGeneral, 2024)
        .await
        .expect("fallback index");

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].election.state, "Montana");
    assert_eq!(results[0].election.race_type, "Attorney General");
    assert_eq!(results[0].candidates[0].name, "Austin Knudsen");
    assert!(results[0].candidates[0].is_winner);

    let requested = wiki.requested();
    assert_eq!(requested.len(), 3);
    assert!(requested[0].0.ends_with("attorney_general_elections"));
    assert!(requested[1].0.ends_with("gubernatorial_elections"));
    assert!(requested.iter().all(|(_, class)| *class == HostClass::Wiki));
}

#[tokio::test]
async fn test_missing_index_without_fallback_is_error() {
    let harvester = Harvester::new(Arc::new(CannedWiki::default()));
    let err = harvester
        .harvest(RaceFamily::Senate, 2024)
        .await
        .expect_err("no index");
    match err {
        ExtractError::Fetch(e) => assert!(e.is_not_found()),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_failed_and_empty_pages_are_skipped() {
    let wiki = Arc::new(
        CannedWiki::default()
            .with(
                "/wiki/2024_United_States_Senate_elections",
                r#"<body>
                  <a href="/wiki/2024_United_States_Senate_election_in_Ohio">Ohio</a>
                  <a href="/wiki/2024_United_States_Senate_election_in_Texas">Texas</a>
                  <a href="/wiki/2024_United_States_Senate_election_in_Utah">Utah</a>
                </body>"#,
            )
            .with(
                "/wiki/2024_United_States_Senate_election_in_Ohio",
                &statewide_page("2024 United States Senate election in Ohio", "Bernie Moreno", "Sherrod Brown"),
            )
            .with(
                "/wiki/2024_United_States_Senate_election_in_Utah",
                "<html><body><p>Results pending.</p></body></html>",
            ),
    );
    let harvester = Harvester::new(wiki.clone());

    let results = harvester
        .harvest(RaceFamily::Senate, 2024)
        .await
        .expect("harvest");

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].election.state, "Ohio");
    assert_eq!(results[0].candidates.len(), 2);
    // Index plus three result pages, the missing one included.
    assert_eq!(wiki.requested().len(), 4);
}

#[tokio::test]
async fn test_enrich_from_profile() {
    let wiki = Arc::new(CannedWiki::default().with(
        "/wiki/Jane_Doe",
        r#"<html><body>
          <table class="infobox"><tr>
            <th class="infobox-label">Website</th>
            <td class="infobox-data">
              <a class="external" href="https://doe.house.gov">House website</a>
              <a class="external" href="https://janedoe.com">Campaign website</a>
            </td>
          </tr></table>
        </body></html>"#,
    ));
    let harvester = Harvester::new(wiki);

    let link = harvester
        .enrich_from_profile("https://en.wikipedia.org/wiki/Jane_Doe")
        .await
        .expect("fetch")
        .expect("campaign site");
    assert_eq!(link.url, "https://janedoe.com");
    assert_eq!(link.confidence, 1.0);

    let missing = harvester
        .enrich_from_profile("https://en.wikipedia.org/wiki/Nobody")
        .await;
    assert!(matches!(missing, Err(ExtractError::Fetch(_))));
}

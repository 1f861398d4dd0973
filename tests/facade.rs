//! The facade exposes everything an application needs to mount and navigate.

use rstest::rstest;
use serde_json::json;
use std::rc::Rc;
use taunus::navigation::testing::{RecordingContainer, TestPlatform};
use taunus::prelude::*;
use tokio::task::LocalSet;

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_mount_and_navigate_through_the_facade() {
	LocalSet::new()
		.run_until(async {
			let test = TestPlatform::new("/");
			test.document.add_script("model", r#"{"title":"Home"}"#);
			test.transport.respond("/about?json", json!({ "title": "About" }));
			let container = Rc::new(RecordingContainer::with_bootstrap_id("model"));
			let wiring = Wiring::new()
				.route("/", RouteDefinition::action("home"))
				.route("/about", RouteDefinition::action("about"))
				.template("home", |_| Ok("<h1>Home</h1>".to_string()))
				.template("about", |_| Ok("<h1>About</h1>".to_string()));

			let taunus = Taunus::new(test.platform());
			let runtime = taunus
				.mount(container.clone(), wiring, MountOptions::new().bootstrap(Bootstrap::Inline))
				.await
				.unwrap();
			let outcome = runtime.go("/about", GoOptions::default()).await.unwrap();

			assert_eq!(
				outcome,
				Navigation::Rendered {
					url: "/about".to_string()
				}
			);
			assert_eq!(container.html(), "<h1>About</h1>");
			assert_eq!(test.history.title(), "About");
		})
		.await;
}

#[rstest]
fn test_bootstrap_modes_parse_from_configuration() {
	let options: taunus::MountOptions =
		serde_json::from_value(json!({ "bootstrap": "manual", "cache": 30, "prefetch": true })).unwrap();

	assert_eq!(options.bootstrap, Bootstrap::Manual);
	assert_eq!(options.cache, CacheSetting::Seconds(30));
	assert!(options.prefetch);
}

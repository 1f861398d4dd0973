//! Mounting, navigation, history and link handling against the in-memory platform.

use rstest::rstest;
use serde_json::{Value, json};
use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;
use taunus_runtime::config::{Bootstrap, CacheSetting, MountOptions};
use taunus_runtime::events::EventKind;
use taunus_runtime::fetcher::FetchError;
use taunus_runtime::links::{AnchorKey, ClickOutcome, LinkClick, LinkHover};
use taunus_runtime::mount::{BootError, MountError, Runtime, Taunus};
use taunus_runtime::partial::RenderError;
use taunus_runtime::platform::{BrowserHistory, Container, HistoryFlavor};
use taunus_runtime::router::{Route, RouteDefinition};
use taunus_runtime::testing::{RecordingContainer, TEST_ORIGIN, TestPlatform};
use taunus_runtime::wiring::Wiring;
use taunus_runtime::{GoOptions, Navigation};
use tokio::task::LocalSet;

async fn local<F: Future>(test: F) -> F::Output {
	LocalSet::new().run_until(test).await
}

fn title(model: &Value) -> &str {
	model["title"].as_str().unwrap_or_default()
}

fn wiring() -> Wiring {
	Wiring::new()
		.route("/", RouteDefinition::action("home"))
		.route("/a/:id", RouteDefinition::action("article"))
		.route("/admin/*", RouteDefinition::ignored())
		.template("home", |model| Ok(format!("<h1>{}</h1>", title(model))))
		.template("article", |model| Ok(format!("<article>{}</article>", title(model))))
}

fn absolute(path: &str) -> String {
	format!("{TEST_ORIGIN}{path}")
}

fn inline(test: &TestPlatform, model: &str) -> Rc<RecordingContainer> {
	test.document.add_script("m", model);
	Rc::new(RecordingContainer::with_bootstrap_id("m"))
}

fn inline_options() -> MountOptions {
	MountOptions::new().bootstrap(Bootstrap::Inline)
}

fn caching_options() -> MountOptions {
	inline_options().cache(CacheSetting::Toggle(true)).prefetch(true)
}

async fn mount_home(test: &TestPlatform, options: MountOptions) -> (Taunus, Runtime, Rc<RecordingContainer>) {
	let container = inline(test, r#"{"title":"Home","action":"home"}"#);
	let taunus = Taunus::new(test.platform());
	let runtime = taunus
		.mount(container.clone(), wiring(), options)
		.await
		.unwrap();
	(taunus, runtime, container)
}

fn record_events(runtime: &Runtime) -> Rc<RefCell<Vec<EventKind>>> {
	let seen = Rc::new(RefCell::new(Vec::new()));
	let sink = Rc::clone(&seen);
	runtime.events().on_any(move |event| sink.borrow_mut().push(event.kind()));
	seen
}

/// Long enough for the interceptor ceiling, cache tiers and scripted delays.
async fn settle() {
	tokio::time::sleep(Duration::from_secs(2)).await;
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_inline_bootstrap_uses_the_embedded_model() {
	local(async {
		let test = TestPlatform::new("/");
		let container = inline(&test, "{&quot;title&quot;:&quot;Hi&quot;,&quot;action&quot;:&quot;home&quot;}");
		let taunus = Taunus::new(test.platform());

		let runtime = taunus
			.mount(container.clone(), wiring(), inline_options())
			.await
			.unwrap();

		assert!(runtime.is_booted());
		assert_eq!(runtime.state().model(), json!({ "title": "Hi", "action": "home" }));
		assert!(test.transport.requests().is_empty());
		assert_eq!(test.history.title(), "Hi");
		assert_eq!(container.renders(), 0);
		assert_eq!(test.history.writes(), (0, 1));
		assert_eq!(test.history.entries()[0].model["title"], "Hi");
	})
	.await;
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_auto_bootstrap_fetches_the_current_location() {
	local(async {
		let test = TestPlatform::new("/a/7");
		test.transport.respond("/a/7?json", json!({ "title": "Seven" }));
		let taunus = Taunus::new(test.platform());

		let runtime = taunus
			.mount(Rc::new(RecordingContainer::default()), wiring(), MountOptions::new())
			.await
			.unwrap();

		assert_eq!(test.transport.requests(), vec!["/a/7?json".to_string()]);
		assert_eq!(runtime.state().model(), json!({ "title": "Seven" }));
	})
	.await;
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_auto_bootstrap_reports_fetch_failure_and_releases_the_guard() {
	local(async {
		let test = TestPlatform::new("/a/7");
		let taunus = Taunus::new(test.platform());

		let err = taunus
			.mount(Rc::new(RecordingContainer::default()), wiring(), MountOptions::new())
			.await
			.unwrap_err();

		assert!(matches!(err, MountError::Fetch(FetchError::Http { status: 404 })));
		assert!(!taunus.is_mounted());
	})
	.await;
}

#[rstest]
#[case::script_missing(Some("m"), "No <script> element with id 'm' holds the view model")]
#[case::no_attribute(None, "Container has no data-taunus attribute naming the model script")]
#[tokio::test(start_paused = true)]
async fn test_inline_bootstrap_requires_the_script(#[case] id: Option<&str>, #[case] message: &str) {
	local(async move {
		let test = TestPlatform::new("/");
		let container = match id {
			Some(id) => RecordingContainer::with_bootstrap_id(id),
			None => RecordingContainer::default(),
		};
		let taunus = Taunus::new(test.platform());

		let err = taunus
			.mount(Rc::new(container), wiring(), inline_options())
			.await
			.unwrap_err();

		assert_eq!(err.to_string(), message);
	})
	.await;
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_mounting_twice_fails_until_unmounted() {
	local(async {
		let test = TestPlatform::new("/");
		let (taunus, _runtime, _container) = mount_home(&test, inline_options()).await;

		let again = taunus
			.mount(Rc::new(RecordingContainer::default()), wiring(), inline_options())
			.await;
		assert!(matches!(again, Err(MountError::AlreadyMounted)));

		assert!(taunus.unmount());
		assert!(!taunus.unmount());
		let remounted = taunus
			.mount(Rc::new(RecordingContainer::with_bootstrap_id("m")), wiring(), inline_options())
			.await;
		assert!(remounted.is_ok());
	})
	.await;
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_manual_bootstrap_with_a_preassigned_model_boots_immediately() {
	local(async {
		let test = TestPlatform::new("/");
		test.ready.assign_model(json!({ "title": "Ready" }));
		let taunus = Taunus::new(test.platform());

		let runtime = taunus
			.mount(
				Rc::new(RecordingContainer::default()),
				wiring(),
				MountOptions::new().bootstrap(Bootstrap::Manual),
			)
			.await
			.unwrap();

		assert!(runtime.is_booted());
		assert_eq!(test.history.title(), "Ready");
	})
	.await;
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_manual_bootstrap_waits_for_the_global_to_be_called() {
	local(async {
		let test = TestPlatform::new("/");
		test.ready.assign_callback();
		let taunus = Taunus::new(test.platform());

		let runtime = taunus
			.mount(
				Rc::new(RecordingContainer::default()),
				wiring(),
				MountOptions::new().bootstrap(Bootstrap::Manual),
			)
			.await
			.unwrap();
		assert!(!runtime.is_booted());

		assert!(test.ready.call(json!({ "title": "Later" })));
		assert!(runtime.is_booted());
		assert!(test.ready.call(json!({ "title": "Ignored" })));
		assert_eq!(runtime.state().model(), json!({ "title": "Later" }));
	})
	.await;
}

#[rstest]
#[case(json!([1, 2]), "an array")]
#[case(json!("text"), "a string")]
#[tokio::test(start_paused = true)]
async fn test_non_object_model_is_rejected(#[case] model: Value, #[case] kind: &'static str) {
	local(async move {
		let test = TestPlatform::new("/");
		test.ready.assign_model(model);
		let taunus = Taunus::new(test.platform());

		let err = taunus
			.mount(
				Rc::new(RecordingContainer::default()),
				wiring(),
				MountOptions::new().bootstrap(Bootstrap::Manual),
			)
			.await
			.unwrap_err();

		assert!(matches!(err, MountError::Boot(BootError::InvalidModel { kind: k }) if k == kind));
		assert!(!taunus.is_mounted());
	})
	.await;
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_go_fetches_renders_and_pushes_history() {
	local(async {
		let test = TestPlatform::new("/");
		let (_taunus, runtime, container) = mount_home(&test, inline_options()).await;
		test.transport.respond("/a/1?json", json!({ "title": "One" }));
		let seen = record_events(&runtime);

		let outcome = runtime.go("/a/1", GoOptions::default()).await.unwrap();

		assert_eq!(
			outcome,
			Navigation::Rendered {
				url: "/a/1".to_string()
			}
		);
		assert_eq!(container.html(), "<article>One</article>");
		assert_eq!(test.history.location(), "/a/1");
		assert_eq!(test.history.title(), "One");
		assert_eq!(test.history.writes(), (1, 1));
		assert_eq!(test.history.scrolls(), vec!["top".to_string()]);
		assert_eq!(
			*seen.borrow(),
			vec![EventKind::FetchStart, EventKind::FetchDone, EventKind::Render]
		);
	})
	.await;
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_go_scrolls_to_the_fragment_target() {
	local(async {
		let test = TestPlatform::new("/");
		let (_taunus, runtime, _container) = mount_home(&test, inline_options()).await;
		test.transport.respond("/a/1?json", json!({ "title": "One" }));
		test.history.add_anchor("comments");

		runtime.go("/a/1#comments", GoOptions::default()).await.unwrap();

		assert_eq!(test.history.scrolls(), vec!["comments".to_string()]);
	})
	.await;
}

#[rstest]
#[case::unknown_route("/nowhere")]
#[case::ignored_route("/admin/users")]
#[tokio::test(start_paused = true)]
async fn test_unroutable_urls_load_the_full_page(#[case] url: &'static str) {
	local(async move {
		let test = TestPlatform::new("/");
		let (_taunus, runtime, _container) = mount_home(&test, inline_options()).await;

		let outcome = runtime.go(url, GoOptions::default()).await.unwrap();

		assert_eq!(outcome, Navigation::FullLoad { url: url.to_string() });
		assert_eq!(test.history.assigned(), vec![url.to_string()]);
		assert!(test.transport.requests().is_empty());
	})
	.await;
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_failed_fetch_falls_back_to_a_full_page_load() {
	local(async {
		let test = TestPlatform::new("/");
		let (_taunus, runtime, container) = mount_home(&test, inline_options()).await;
		test.transport.fail("/a/2?json", FetchError::Network("offline".to_string()));

		let outcome = runtime.go("/a/2", GoOptions::default()).await.unwrap();

		assert_eq!(outcome, Navigation::FullLoad { url: "/a/2".to_string() });
		assert_eq!(container.renders(), 0);
	})
	.await;
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_without_history_support_every_navigation_is_a_full_load() {
	local(async {
		let test = TestPlatform::with_flavor("/", HistoryFlavor::Unsupported);
		let (_taunus, runtime, _container) = mount_home(&test, inline_options()).await;

		let outcome = runtime.go("/a/1", GoOptions::default()).await.unwrap();

		assert_eq!(outcome, Navigation::FullLoad { url: "/a/1".to_string() });
		assert_eq!(test.history.writes(), (0, 0));
	})
	.await;
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_quirky_history_never_calls_replace_state() {
	local(async {
		let test = TestPlatform::with_flavor("/", HistoryFlavor::QuirkyReplaceState);
		let (_taunus, runtime, _container) = mount_home(&test, inline_options()).await;
		test.transport.respond("/a/1?json", json!({ "title": "One" }));
		assert_eq!(test.history.writes(), (0, 0));

		runtime.go("/a/1", GoOptions::default()).await.unwrap();
		runtime
			.go(
				"/a/1",
				GoOptions {
					replace_state: true,
					..GoOptions::default()
				},
			)
			.await
			.unwrap();

		assert_eq!(test.history.writes(), (1, 0));
	})
	.await;
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_redirect_models_are_followed() {
	local(async {
		let test = TestPlatform::new("/");
		let (_taunus, runtime, container) = mount_home(&test, inline_options()).await;
		test.transport.respond("/a/old?json", json!({ "redirect": { "href": "/a/new" } }));
		test.transport.respond("/a/new?json", json!({ "title": "New" }));
		test.transport.respond("/a/out?json", json!({ "redirect": { "href": "/login", "hard": true } }));

		let soft = runtime.go("/a/old", GoOptions::default()).await.unwrap();
		assert_eq!(soft, Navigation::Rendered { url: "/a/new".to_string() });
		assert_eq!(container.html(), "<article>New</article>");
		assert_eq!(test.history.location(), "/a/new");

		let hard = runtime.go("/a/out", GoOptions::default()).await.unwrap();
		assert_eq!(hard, Navigation::FullLoad { url: "/login".to_string() });
	})
	.await;
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_back_navigation_rerenders_the_stashed_model() {
	local(async {
		let test = TestPlatform::new("/");
		let (_taunus, runtime, container) = mount_home(&test, inline_options()).await;
		test.transport.respond("/a/1?json", json!({ "title": "One" }));
		runtime.go("/a/1", GoOptions::default()).await.unwrap();

		let stashed = test.history.back();
		runtime.activator().on_popstate(stashed).unwrap();

		assert_eq!(container.html(), "<h1>Home</h1>");
		assert_eq!(test.history.title(), "Home");
		assert_eq!(runtime.state().model()["title"], "Home");
		assert_eq!(test.history.writes(), (1, 1));
		assert_eq!(test.transport.requests().len(), 1);
	})
	.await;
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_popstate_without_a_model_is_ignored() {
	local(async {
		let test = TestPlatform::new("/");
		let (_taunus, runtime, container) = mount_home(&test, inline_options()).await;

		runtime.activator().on_popstate(None).unwrap();

		assert_eq!(container.renders(), 0);
	})
	.await;
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_cached_model_serves_the_next_navigation() {
	local(async {
		let test = TestPlatform::new("/");
		let (_taunus, runtime, container) = mount_home(&test, caching_options()).await;
		test.transport.respond("/a/1?json", json!({ "title": "One" }));

		runtime.go("/a/1", GoOptions::default()).await.unwrap();
		runtime.go("/", GoOptions::default()).await.unwrap();
		runtime.go("/a/1", GoOptions::default()).await.unwrap();
		settle().await;

		assert_eq!(test.transport.requests(), vec!["/a/1?json".to_string()]);
		assert_eq!(container.html(), "<article>One</article>");
		assert_eq!(test.storage.entry("/a/1").map(|e| e.data), Some(json!({ "title": "One" })));
	})
	.await;
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_route_with_caching_disabled_always_fetches() {
	local(async {
		let test = TestPlatform::new("/");
		let container = inline(&test, r#"{"title":"Home"}"#);
		let taunus = Taunus::new(test.platform());
		let wiring = wiring().route("/live", RouteDefinition::action("home").with_cache(CacheSetting::Toggle(false)));
		let runtime = taunus.mount(container, wiring, caching_options()).await.unwrap();
		test.transport.respond("/live?json", json!({ "title": "Live" }));

		runtime.go("/live", GoOptions::default()).await.unwrap();
		runtime.go("/live", GoOptions::default()).await.unwrap();

		assert_eq!(test.transport.requests().len(), 2);
		assert!(test.storage.entry("/live").is_none());
	})
	.await;
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_click_while_prefetching_waits_for_the_prefetch() {
	local(async {
		let test = TestPlatform::new("/");
		let (_taunus, runtime, container) = mount_home(&test, caching_options()).await;
		let href = absolute("/a/1");
		let json_url = format!("{href}?json");
		test.transport
			.respond_after(&json_url, json!({ "title": "One" }), Duration::from_millis(100));
		let links = runtime.links();
		let anchor = AnchorKey(1);

		assert!(links.on_hover(&LinkHover {
			anchor,
			href: href.clone(),
			origin: TEST_ORIGIN.to_string(),
		}));
		tokio::time::sleep(Duration::from_millis(10)).await;
		assert!(links.is_prefetching(anchor));

		let outcome = links.on_click(&LinkClick::primary(anchor, href.clone(), TEST_ORIGIN));
		assert_eq!(outcome, ClickOutcome::Queued);
		assert!(links.is_on_hold(anchor));
		assert_eq!(container.renders(), 0);

		settle().await;

		assert_eq!(test.transport.requests(), vec![json_url]);
		assert!(!links.is_prefetching(anchor));
		assert!(!links.is_on_hold(anchor));
		assert_eq!(container.html(), "<article>One</article>");
		assert_eq!(runtime.state().model(), json!({ "title": "One" }));
	})
	.await;
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_hovering_another_link_aborts_the_previous_prefetch() {
	local(async {
		let test = TestPlatform::new("/");
		let (_taunus, runtime, _container) = mount_home(&test, caching_options()).await;
		let slow = Duration::from_millis(500);
		test.transport
			.respond_after(&absolute("/a/1?json"), json!({ "title": "One" }), slow);
		test.transport
			.respond_after(&absolute("/a/2?json"), json!({ "title": "Two" }), slow);
		let seen = record_events(&runtime);
		let links = runtime.links();

		links.on_hover(&LinkHover {
			anchor: AnchorKey(1),
			href: absolute("/a/1"),
			origin: TEST_ORIGIN.to_string(),
		});
		// past the cache miss, into the network request
		tokio::time::sleep(Duration::from_millis(250)).await;
		assert_eq!(test.transport.requests(), vec![absolute("/a/1?json")]);
		links.on_hover(&LinkHover {
			anchor: AnchorKey(2),
			href: absolute("/a/2"),
			origin: TEST_ORIGIN.to_string(),
		});
		settle().await;

		assert_eq!(test.transport.cancelled(), vec![absolute("/a/1?json")]);
		assert_eq!(test.transport.requests().len(), 2);
		assert!(seen.borrow().contains(&EventKind::FetchAbort));
		assert!(!links.is_prefetching(AnchorKey(1)));
		assert_eq!(runtime.state().cache().get("/a/1").await, None);
		assert_eq!(runtime.state().cache().get("/a/2").await, Some(json!({ "title": "Two" })));
	})
	.await;
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_prefetch_requires_caching() {
	local(async {
		let test = TestPlatform::new("/");
		let (_taunus, runtime, _container) = mount_home(&test, inline_options().prefetch(true)).await;

		let started = runtime.links().on_hover(&LinkHover {
			anchor: AnchorKey(1),
			href: absolute("/a/1"),
			origin: TEST_ORIGIN.to_string(),
		});

		assert!(!started);
		assert!(test.transport.requests().is_empty());
	})
	.await;
}

#[rstest]
#[case::modifier(LinkClick { modifier: true, ..LinkClick::primary(AnchorKey(1), absolute("/a/1"), TEST_ORIGIN) }, ClickOutcome::Ignored)]
#[case::middle_button(LinkClick { button: 1, ..LinkClick::primary(AnchorKey(1), absolute("/a/1"), TEST_ORIGIN) }, ClickOutcome::Ignored)]
#[case::foreign_origin(LinkClick::primary(AnchorKey(1), "https://elsewhere.test/a/1", "https://elsewhere.test"), ClickOutcome::Ignored)]
#[case::ignored_route(LinkClick::primary(AnchorKey(1), absolute("/admin/x"), TEST_ORIGIN), ClickOutcome::Ignored)]
#[case::unknown_route(LinkClick::primary(AnchorKey(1), absolute("/nowhere"), TEST_ORIGIN), ClickOutcome::Ignored)]
#[case::same_page_fragment(LinkClick::primary(AnchorKey(1), absolute("/#top"), TEST_ORIGIN), ClickOutcome::InPage)]
#[case::current_url(LinkClick::primary(AnchorKey(1), absolute("/"), TEST_ORIGIN), ClickOutcome::Ignored)]
#[case::routed(LinkClick::primary(AnchorKey(1), absolute("/a/1"), TEST_ORIGIN), ClickOutcome::Navigating)]
#[tokio::test(start_paused = true)]
async fn test_click_classification(#[case] click: LinkClick, #[case] expected: ClickOutcome) {
	local(async move {
		let test = TestPlatform::new("/");
		let (_taunus, runtime, _container) = mount_home(&test, inline_options()).await;
		test.transport.respond(&absolute("/a/1?json"), json!({ "title": "One" }));

		assert_eq!(runtime.links().on_click(&click), expected);
		settle().await;
		assert!(test.history.assigned().is_empty());
		let pushes = usize::from(expected == ClickOutcome::Navigating);
		assert_eq!(test.history.writes(), (pushes, 1));
	})
	.await;
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_unmount_drops_subscribers_and_pending_fetches() {
	local(async {
		let test = TestPlatform::new("/");
		let (taunus, runtime, _container) = mount_home(&test, inline_options()).await;
		test.transport
			.respond_after("/a/1?json", json!({ "title": "One" }), Duration::from_millis(100));
		let seen = record_events(&runtime);

		let pending = {
			let runtime = runtime.clone();
			tokio::task::spawn_local(async move { runtime.go("/a/1", GoOptions::default()).await })
		};
		tokio::time::sleep(Duration::from_millis(10)).await;
		assert!(taunus.unmount());

		assert_eq!(pending.await.unwrap().unwrap(), Navigation::Aborted);
		assert_eq!(*seen.borrow(), vec![EventKind::FetchStart]);
		assert!(taunus.runtime().is_none());
	})
	.await;
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_links_stay_inert_until_the_first_model_boots() {
	local(async {
		let test = TestPlatform::new("/");
		test.transport
			.respond_after("/?json", json!({ "title": "Home", "action": "home" }), Duration::from_millis(300));
		test.transport.respond(&absolute("/a/1?json"), json!({ "title": "One" }));
		let taunus = Rc::new(Taunus::new(test.platform()));
		let mounting = {
			let taunus = Rc::clone(&taunus);
			tokio::task::spawn_local(async move {
				taunus
					.mount(
						Rc::new(RecordingContainer::default()),
						wiring(),
						MountOptions::new().cache(CacheSetting::Toggle(true)).prefetch(true),
					)
					.await
			})
		};

		tokio::time::sleep(Duration::from_millis(100)).await;
		let early = taunus.runtime().unwrap();
		assert!(!early.is_booted());
		let click = LinkClick::primary(AnchorKey(1), absolute("/a/1"), TEST_ORIGIN);
		assert_eq!(early.links().on_click(&click), ClickOutcome::Ignored);
		assert!(!early.links().on_hover(&LinkHover {
			anchor: AnchorKey(1),
			href: absolute("/a/1"),
			origin: TEST_ORIGIN.to_string(),
		}));

		let runtime = mounting.await.unwrap().unwrap();
		settle().await;

		assert!(taunus.is_mounted());
		assert!(runtime.is_booted());
		assert_eq!(test.transport.requests(), vec!["/?json".to_string()]);
		assert_eq!(test.history.location(), "/");
		assert_eq!(test.history.writes(), (0, 1));
		assert_eq!(runtime.links().on_click(&click), ClickOutcome::Navigating);
	})
	.await;
}

type Calls = Rc<RefCell<Vec<(String, Option<String>)>>>;

fn recording_controller(calls: &Calls) -> impl Fn(&Value, &Rc<dyn Container>, Option<&Route>) + 'static {
	let calls = Rc::clone(calls);
	move |model: &Value, _container: &Rc<dyn Container>, route: Option<&Route>| {
		calls
			.borrow_mut()
			.push((title(model).to_string(), route.map(|r| r.url.clone())));
	}
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_controllers_run_after_start_and_go() {
	local(async {
		let test = TestPlatform::new("/");
		let container = inline(&test, r#"{"title":"Home","action":"home"}"#);
		test.transport.respond("/a/1?json", json!({ "title": "One" }));
		let calls: Calls = Rc::default();
		let wiring = wiring()
			.controller("home", recording_controller(&calls))
			.controller("article", recording_controller(&calls));
		let taunus = Taunus::new(test.platform());

		let runtime = taunus.mount(container.clone(), wiring, inline_options()).await.unwrap();
		runtime.go("/a/1", GoOptions::default()).await.unwrap();

		assert_eq!(
			*calls.borrow(),
			vec![
				("Home".to_string(), Some("/".to_string())),
				("One".to_string(), Some("/a/1".to_string())),
			]
		);
		assert_eq!(container.html(), "<article>One</article>");
	})
	.await;
}

fn failing_wiring() -> Wiring {
	wiring()
		.route("/broken", RouteDefinition::action("broken"))
		.template("broken", |_| Err("template exploded".into()))
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn test_template_failure_surfaces_from_go_and_popstate() {
	local(async {
		let test = TestPlatform::new("/");
		let container = inline(&test, r#"{"title":"Home","action":"home"}"#);
		test.transport.respond("/broken?json", json!({ "title": "Broken" }));
		let taunus = Taunus::new(test.platform());
		let runtime = taunus
			.mount(container.clone(), failing_wiring(), inline_options())
			.await
			.unwrap();

		let err = runtime.go("/broken", GoOptions::default()).await.unwrap_err();
		assert!(matches!(&err, RenderError::Template { action, .. } if action == "broken"));
		assert_eq!(
			std::error::Error::source(&err).map(|s| s.to_string()),
			Some("template exploded".to_string())
		);

		let err = runtime
			.activator()
			.on_popstate(Some(json!({ "title": "Back", "action": "broken" })))
			.unwrap_err();
		assert!(matches!(err, RenderError::Template { action, .. } if action == "broken"));
		assert_eq!(container.renders(), 0);
	})
	.await;
}

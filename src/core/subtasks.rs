use tokio::sync::watch;

use super::reminder::{DetailLevel, Reminder};
use crate::chat::ChatClient;

/// Build the request for `count` subtasks of a task titled `title`.
pub fn build_prompt(title: &str, notes: Option<&str>, count: usize) -> String {
    let mut prompt = String::from(
        "You will be given some text representing a single task that the user has to complete, \
         an optional further description of the task, and the number of subtasks you should \
         respond with. Your job is to respond with subtasks that the user can use to complete \
         the specified task. Your response should contain exactly the given number of subtasks. \
         Your response should only contain the subtasks and nothing else. Each of the subtasks \
         should be no longer than 6 words, as if the user was 5 years old, and on a new \
         numbered line.\n\n",
    );

    prompt.push_str(&format!("The single task is: {}\n", title));
    if let Some(notes) = notes.filter(|n| !n.is_empty()) {
        prompt.push_str(&format!("The additional description is: {}\n", notes));
    }
    prompt.push_str(&format!("The number of subtasks are: {}", count));

    prompt
}

/// Pull subtasks out of a numbered reply.
///
/// Every non-empty line loses everything up to and including its first space,
/// which is where the model puts "1." or "2)". Lines without a space are dropped.
pub fn parse_subtasks(reply: &str) -> Vec<String> {
    reply
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let (_, rest) = line.split_once(' ')?;
            (!rest.is_empty()).then(|| rest.to_string())
        })
        .collect()
}

/// Asks a chat model to break a reminder into small steps.
#[derive(Debug)]
pub struct SubtaskGenerator<C> {
    chat: C,
    loading: watch::Sender<bool>,
}

impl<C: ChatClient> SubtaskGenerator<C> {
    pub fn new(chat: C) -> Self {
        let (loading, _) = watch::channel(false);
        Self { chat, loading }
    }

    pub fn chat(&self) -> &C {
        &self.chat
    }

    pub fn is_loading(&self) -> bool {
        *self.loading.borrow()
    }

    /// Observe the in-flight flag.
    pub fn subscribe_loading(&self) -> watch::Receiver<bool> {
        self.loading.subscribe()
    }

    /// Generate subtasks for `reminder`.
    ///
    /// Does nothing without an API key or a title. Failures are logged and come
    /// back as an empty list.
    pub async fn generate(
        &self,
        reminder: &Reminder,
        detail_level: DetailLevel,
        api_key: &str,
    ) -> Vec<String> {
        if api_key.is_empty() {
            log::debug!("No API key configured; skipping generation");
            return Vec::new();
        }
        let Some(title) = reminder.title() else {
            return Vec::new();
        };

        // Each generation starts from a blank conversation.
        self.chat.clear_history();

        let prompt = build_prompt(title, reminder.notes(), detail_level.subtask_count());
        log::debug!("Prompt:\n{}", prompt);

        self.loading.send_replace(true);
        let result = self.chat.send_message(api_key, &prompt).await;
        self.loading.send_replace(false);

        match result {
            Ok(reply) => {
                let subtasks = parse_subtasks(&reply);
                log::info!(
                    "Generated {} subtasks for reminder {}",
                    subtasks.len(),
                    reminder.id
                );
                subtasks
            }
            Err(e) => {
                log::error!("Subtask generation failed: {}", e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::reminder::Calendar;
    use crate::{Error, Result};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Chat double that replays canned replies and records what it was sent.
    #[derive(Debug, Default)]
    pub(crate) struct ScriptedChat {
        pub replies: Mutex<Vec<Result<String>>>,
        pub sent: Mutex<Vec<String>>,
        pub clears: Mutex<usize>,
    }

    impl ScriptedChat {
        pub fn replying(replies: Vec<Result<String>>) -> Self {
            Self {
                replies: Mutex::new(replies),
                ..Self::default()
            }
        }
    }

    impl ChatClient for ScriptedChat {
        async fn send_message(&self, _api_key: &str, text: &str) -> Result<String> {
            self.sent.lock().unwrap().push(text.to_string());
            let mut replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                return Err(Error::MalformedResponse("no scripted reply".into()));
            }
            replies.remove(0)
        }

        fn clear_history(&self) {
            *self.clears.lock().unwrap() += 1;
        }
    }

    /// Chat double that holds every request until released.
    #[derive(Debug, Default)]
    struct GatedChat {
        release: Notify,
    }

    impl ChatClient for GatedChat {
        async fn send_message(&self, _api_key: &str, _text: &str) -> Result<String> {
            self.release.notified().await;
            Ok("1. Open window".into())
        }

        fn clear_history(&self) {}
    }

    fn clean_room() -> Reminder {
        Reminder::new("1", "Clean room", Calendar::new("home", "Home")).with_notes("before Friday")
    }

    #[test]
    fn parses_numbered_lines() {
        let reply = "1. Get the mop\n2. Wet the mop\n3. Wipe the floor";
        assert_eq!(
            parse_subtasks(reply),
            vec!["Get the mop", "Wet the mop", "Wipe the floor"]
        );
    }

    #[test]
    fn drops_lines_without_space_and_blank_lines() {
        let reply = "NoSpaceHere\n\n1) Open window\r\n2. \n";
        assert_eq!(parse_subtasks(reply), vec!["Open window"]);
    }

    #[test]
    fn prompt_requests_count_and_embeds_task() {
        let prompt = build_prompt("Clean room", Some("before Friday"), 8);
        assert!(prompt.contains("The single task is: Clean room"));
        assert!(prompt.contains("The additional description is: before Friday"));
        assert!(prompt.ends_with("The number of subtasks are: 8"));
        assert!(prompt.contains("no longer than 6 words"));
    }

    #[test]
    fn prompt_omits_empty_notes() {
        assert!(!build_prompt("Clean room", None, 4).contains("additional description"));
        assert!(!build_prompt("Clean room", Some(""), 4).contains("additional description"));
    }

    #[test]
    fn detail_level_sets_requested_count() {
        assert!(build_prompt("x", None, DetailLevel::new(1).subtask_count()).ends_with(": 4"));
        assert!(build_prompt("x", None, DetailLevel::new(5).subtask_count()).ends_with(": 20"));
    }

    #[tokio::test]
    async fn generate_clears_history_then_parses() {
        let generator =
            SubtaskGenerator::new(ScriptedChat::replying(vec![Ok("1. Get the mop\n2. Wet the mop".into())]));
        let subtasks = generator.generate(&clean_room(), DetailLevel::new(2), "key").await;
        assert_eq!(subtasks, vec!["Get the mop", "Wet the mop"]);
        assert_eq!(*generator.chat().clears.lock().unwrap(), 1);
        assert!(generator.chat().sent.lock().unwrap()[0].ends_with("are: 8"));
        assert!(!generator.is_loading());
    }

    #[tokio::test]
    async fn failure_yields_empty_and_clears_loading() {
        let generator = SubtaskGenerator::new(ScriptedChat::replying(vec![Err(Error::Api {
            status: 500,
            body: "boom".into(),
        })]));
        let subtasks = generator.generate(&clean_room(), DetailLevel::default(), "key").await;
        assert!(subtasks.is_empty());
        assert!(!generator.is_loading());
    }

    #[tokio::test]
    async fn loading_while_request_is_in_flight() {
        let generator = Arc::new(SubtaskGenerator::new(GatedChat::default()));
        let mut loading = generator.subscribe_loading();
        assert!(!generator.is_loading());

        let task = {
            let generator = generator.clone();
            tokio::spawn(async move {
                generator
                    .generate(&clean_room(), DetailLevel::default(), "key")
                    .await
            })
        };

        tokio::time::timeout(Duration::from_secs(2), loading.wait_for(|busy| *busy))
            .await
            .expect("loading never turned on")
            .unwrap();
        assert!(generator.is_loading());

        generator.chat().release.notify_one();
        let subtasks = task.await.unwrap();
        assert_eq!(subtasks, vec!["Open window"]);
        assert!(!generator.is_loading());
    }

    #[tokio::test]
    async fn empty_key_sends_nothing() {
        let generator = SubtaskGenerator::new(ScriptedChat::default());
        let subtasks = generator.generate(&clean_room(), DetailLevel::default(), "").await;
        assert!(subtasks.is_empty());
        assert!(generator.chat().sent.lock().unwrap().is_empty());
        assert_eq!(*generator.chat().clears.lock().unwrap(), 0);
    }
}

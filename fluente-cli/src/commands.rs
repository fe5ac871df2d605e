//! Subcommand handlers

use std::io::Write;
use std::sync::Arc;

use color_eyre::eyre::Result;
use fluente_core::generation::{ConjugationTable, ExampleList, Scene, VocabularyList};
use fluente_core::{
    Config, ContentGenerator, ContentLibrary, Conversation, ExclusionSet, TutorBackend, TutorError,
};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::sink::StdoutSink;

/// Everything a handler needs
pub struct Context {
    pub library: ContentLibrary,
    pub tutor: Arc<dyn TutorBackend>,
    pub config: Config,
    pub json: bool,
}

impl Context {
    pub fn new(
        config: Config,
        generator: Arc<dyn ContentGenerator>,
        tutor: Arc<dyn TutorBackend>,
        json: bool,
    ) -> Result<Self> {
        let library = ContentLibrary::open(&config, generator)?;
        Ok(Self {
            library,
            tutor,
            config,
            json,
        })
    }

    fn emit<T: Serialize>(&self, value: &T, render: impl FnOnce(&T)) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            render(value);
        }
        Ok(())
    }
}

pub async fn conjugate(ctx: &Context, verb: &str, then: Vec<String>) -> Result<()> {
    // The selected verb leads the list so look-ahead warms what follows it
    let mut list = vec![verb.to_string()];
    list.extend(then);
    ctx.library.on_verb_selected(&list, 0);

    let table = ctx.library.conjugation(verb).await?;
    ctx.emit(&table, print_table)
}

pub async fn examples(ctx: &Context, verb: &str, form: &str, more: bool) -> Result<()> {
    let list = if more {
        let cached = ctx.library.examples(verb, form).await?;
        let seen: ExclusionSet = cached.sentences.into_iter().map(|s| s.text).collect();
        ctx.library.more_examples(verb, form, &seen).await?
    } else {
        ctx.library.examples(verb, form).await?
    };
    ctx.emit(&list, print_examples)
}

pub async fn vocabulary(ctx: &Context, category: &str, exclude: Vec<String>) -> Result<()> {
    let exclude: ExclusionSet = exclude.into_iter().collect();
    let list = ctx.library.vocabulary(category, &exclude).await?;
    ctx.emit(&list, print_vocabulary)
}

pub async fn scene(ctx: &Context, domain: &str, subtopic: &str, function: &str) -> Result<()> {
    let scene = ctx.library.scene(domain, subtopic, function).await?;
    ctx.emit(&scene, print_scene)
}

pub async fn warm(ctx: &Context, verbs: Vec<String>) {
    // Nothing is being fetched in the foreground, so every verb is warmed
    ctx.library.warm_startup(verbs, None);
    ctx.library.quiesce().await;

    let cache = ctx.library.conjugations().cache();
    println!("{} conjugation tables cached", cache.len());
}

pub fn stats(ctx: &Context) {
    let lib = &ctx.library;
    let counts = [
        lib.conjugations().cache().len(),
        lib.example_source().cache().len(),
        lib.vocabulary_source().cache().len(),
        lib.scene_source().cache().len(),
        lib.speech_source().cache().len(),
    ];
    for ((namespace, metrics), entries) in lib.cache_metrics().into_iter().zip(counts) {
        println!("{namespace:<20} {entries:>6} entries");
        metrics.print(namespace);
    }
}

pub async fn chat(ctx: &Context) -> Result<()> {
    let conversation = Conversation::new(
        Arc::clone(&ctx.tutor),
        ctx.config.tutor.failure_policy,
        ctx.config.tutor.history_limit,
    );
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut sink = StdoutSink::default();

    println!("Type a message, or /quit to leave.");
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "/quit" {
            break;
        }

        match conversation.send(line, &mut sink).await {
            Ok(_) => {},
            // Already reported through the sink
            Err(TutorError::Stream(_)) => {},
            Err(e) => eprintln!("{e}"),
        }
    }

    tracing::debug!(messages = conversation.len(), "Chat ended");
    Ok(())
}

fn print_table(table: &ConjugationTable) {
    println!("{} ({})", table.verb, table.translation);
    for tense in &table.tenses {
        println!("\n  {}", tense.name);
        for form in &tense.forms {
            println!("    {:<10} {}", form.person, form.form);
        }
    }
}

fn print_examples(list: &ExampleList) {
    for sentence in &list.sentences {
        println!("- {}\n  {}", sentence.text, sentence.translation);
    }
}

fn print_vocabulary(list: &VocabularyList) {
    println!("{}", list.category);
    for item in &list.words {
        match &item.example {
            Some(example) => println!("  {:<16} {:<16} {}", item.word, item.translation, example),
            None => println!("  {:<16} {}", item.word, item.translation),
        }
    }
}

fn print_scene(scene: &Scene) {
    println!("{}\n", scene.title);
    for line in &scene.lines {
        println!("{}: {}\n   {}", line.speaker, line.text, line.translation);
    }
}

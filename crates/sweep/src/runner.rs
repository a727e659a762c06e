//! The sweep loop: one pass over followings or followers.

use crate::classifier::{Classifier, Rule, Verdict};
use crate::console::{Console, Tone};
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use deadwood_cache::ActivityCache;
use deadwood_core::InstancePolicy;
use deadwood_mastodon::{Account, SocialApi};
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Followings,
    Followers,
    /// Followers, judged by mutuality instead of activity.
    Unmutuals,
}

impl Mode {
    pub fn from_flags(followers: bool, unmutuals: bool) -> Self {
        match (followers, unmutuals) {
            (_, true) => Mode::Unmutuals,
            (true, false) => Mode::Followers,
            (false, false) => Mode::Followings,
        }
    }

    pub fn targets_followers(self) -> bool {
        !matches!(self, Mode::Followings)
    }

    fn collection_name(self) -> &'static str {
        if self.targets_followers() { "Followers" } else { "Followings" }
    }
}

#[derive(Debug, Clone)]
pub struct SweepOptions {
    pub mode: Mode,
    /// `None` (or zero) turns the inactivity rule off.
    pub min_activity: Option<Duration>,
    pub target_count: Option<u64>,
    /// Actually unfollow/remove; otherwise only report.
    pub apply: bool,
    pub verbose: bool,
}

impl SweepOptions {
    pub fn rule(&self) -> Rule {
        match self.mode {
            Mode::Unmutuals => Rule::Unmutual,
            Mode::Followings | Mode::Followers => self
                .min_activity
                .filter(|d| *d > Duration::zero())
                .map(Rule::Inactivity)
                .unwrap_or(Rule::Disabled),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccountFailure {
    pub account_id: String,
    pub acct: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepReport {
    /// Size of the fetched collection.
    pub total: usize,
    /// Accounts looked at before the loop ended.
    pub examined: usize,
    /// Ids classified dead, in order.
    pub dead: Vec<String>,
    /// Removals actually sent to the server.
    pub removed: usize,
    pub failures: Vec<AccountFailure>,
    pub initial_count: u64,
    pub remaining: u64,
    pub stopped_early: bool,
}

/// One-shot account header, reset for every account.
struct Header<'a> {
    account: &'a Account,
    printed: bool,
}

impl<'a> Header<'a> {
    fn new(account: &'a Account) -> Self {
        Self {
            account,
            printed: false,
        }
    }

    fn show(&mut self, console: &mut Console) {
        if self.printed {
            return;
        }
        self.printed = true;
        console.say(
            Tone::Header,
            &format!("Account: {} (#{})", self.account.acct, self.account.id),
        );
    }
}

pub struct Sweeper<'a, A: SocialApi + ?Sized> {
    api: &'a A,
    cache: &'a mut ActivityCache,
    policy: &'a InstancePolicy,
    options: SweepOptions,
    console: Console,
}

impl<'a, A: SocialApi + ?Sized> Sweeper<'a, A> {
    pub fn new(
        api: &'a A,
        cache: &'a mut ActivityCache,
        policy: &'a InstancePolicy,
        options: SweepOptions,
        console: Console,
    ) -> Self {
        Self {
            api,
            cache,
            policy,
            options,
            console,
        }
    }

    /// Full run: whoami, fetch the collection, sweep it.
    pub async fn run(mut self) -> Result<SweepReport> {
        let me = self
            .api
            .verify_credentials()
            .await
            .context("verifying credentials")?;

        let mode = self.options.mode;
        let initial_count = if mode.targets_followers() {
            me.followers_count
        } else {
            me.following_count
        };

        self.console.say(
            Tone::Good,
            &format!("Current user: @{} (#{})", me.username, me.id),
        );
        let goal = match self.options.target_count {
            Some(target) => format!(" (goal: n>={})", target),
            None => String::new(),
        };
        self.console.say(
            Tone::Good,
            &format!("{}: {}{}", mode.collection_name(), initial_count, goal),
        );
        if self.options.apply {
            self.console.say(Tone::Failure, "Action: unfollow");
        } else {
            self.console.say(Tone::Notice, "Action: none");
        }

        let accounts = if mode.targets_followers() {
            self.api.followers(&me.id).await
        } else {
            self.api.following(&me.id).await
        }
        .with_context(|| format!("fetching {}", mode.collection_name().to_lowercase()))?;
        info!("Fetched {} accounts to check", accounts.len());

        Ok(self.sweep(&accounts, initial_count, Utc::now()).await)
    }

    /// Walks `accounts`, acting on dead ones. Never fails as a whole.
    pub async fn sweep(
        &mut self,
        accounts: &[Account],
        initial_count: u64,
        now: DateTime<Utc>,
    ) -> SweepReport {
        let rule = self.options.rule();
        debug!("Sweeping {} accounts with rule {:?}", accounts.len(), rule);

        let mut classifier = Classifier::new(self.api, &mut *self.cache, self.policy, rule, now);
        let mut report = SweepReport {
            total: accounts.len(),
            initial_count,
            remaining: initial_count,
            ..SweepReport::default()
        };

        self.console.start_progress(accounts.len());

        for (index, account) in accounts.iter().enumerate() {
            self.console.progress_to(index, &account.handle());

            if let Some(target) = self.options.target_count {
                if report.remaining <= target {
                    self.console.say(
                        Tone::Stop,
                        &format!("{} followings left; stopping", report.remaining),
                    );
                    report.stopped_early = true;
                    break;
                }
            }

            report.examined += 1;
            let mut header = Header::new(account);
            if self.options.verbose {
                header.show(&mut self.console);
            }

            let outcome = process(
                self.api,
                &mut classifier,
                &mut self.console,
                &self.options,
                account,
                &mut report,
                &mut header,
            )
            .await;

            if let Err(e) = outcome {
                header.show(&mut self.console);
                self.console.say(Tone::Failure, &format!("- Error: {:#}", e));
                error!("Error processing {}: {:#}", account.acct, e);
                report.failures.push(AccountFailure {
                    account_id: account.id.clone(),
                    acct: account.acct.clone(),
                    error: format!("{:#}", e),
                });
            }
        }

        if !report.stopped_early {
            self.console.progress_to(accounts.len(), "");
        }
        self.console.finish_progress();

        report
    }
}

/// Classify one account and act on the verdict.
async fn process<A: SocialApi + ?Sized>(
    api: &A,
    classifier: &mut Classifier<'_, A>,
    console: &mut Console,
    options: &SweepOptions,
    account: &Account,
    report: &mut SweepReport,
    header: &mut Header<'_>,
) -> Result<()> {
    let Verdict { act, finding } = classifier
        .classify(account)
        .await
        .with_context(|| format!("looking up {}", account.handle()))?;

    if finding.is_notable() || options.verbose {
        if let Some(line) = finding.line() {
            header.show(console);
            console.say(finding.tone(), &line);
        }
    }

    if !act {
        return Ok(());
    }

    debug!("{} is dead: {}", account.acct, finding.reason());
    report.remaining = report.remaining.saturating_sub(1);
    report.dead.push(account.id.clone());
    header.show(console);

    let handle = account.handle();
    let followers = options.mode.targets_followers();
    match (options.apply, followers) {
        (true, true) => {
            console.say(Tone::Action, &format!("- Removing follower {}", handle));
            // Block then unblock drops the follow without leaving a block behind.
            api.block(&account.id).await.context("blocking")?;
            api.unblock(&account.id).await.context("unblocking")?;
            report.removed += 1;
            info!("Removed follower {} ({})", account.acct, finding.reason());
        }
        (true, false) => {
            console.say(Tone::Action, &format!("- Unfollowing {}", handle));
            api.unfollow(&account.id).await.context("unfollowing")?;
            report.removed += 1;
            info!("Unfollowed {} ({})", account.acct, finding.reason());
        }
        (false, true) => console.say(Tone::Action, &format!("- (not) removing follower {}", handle)),
        (false, false) => console.say(Tone::Action, &format!("- (not) unfollowing {}", handle)),
    }

    console.say(
        Tone::Info,
        &format!(
            "- {}/{} followings left",
            report.remaining, report.initial_count
        ),
    );

    Ok(())
}

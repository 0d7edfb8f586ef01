//! `.czy` - a magic 8-ball, only less helpful

use async_trait::async_trait;
use rand::Rng;
use rand::seq::SliceRandom;

use crate::Result;
use crate::channels::IncomingMessage;
use crate::router::{Action, Context, Handler};

const YES: &[&str] = &[
    "tak",
    "tak",
    "na pewno",
    "jeszcze się pytasz?",
    "tak (no homo)",
    "zaiste",
    "teraz już tak",
    "a czy papież sra w lesie?",
    "jak najbardziej",
    "jeszcze jak",
    "jest możliwe",
    "owszem",
    "czemu nie",
    "no w sumie...",
    "nom",
    "w rzeczy samej",
    "na bank",
    "skoro tak mówisz, to nie będę zaprzeczał",
];

const NO: &[&str] = &[
    "nie",
    "nie",
    "to mało prawdopodobne",
    "nie sądzę",
    "tak (żartuję, hehe)",
    "no chyba cię pambuk opuścił",
    "raczej nie",
    "jeszcze nie",
    "gówno prawda",
    "otóż nie",
    "niep",
    "akurat",
    "nawet o tym nie myśl",
    "bynajmniej",
    "co ty gadasz",
    "chyba ty",
];

const DUNNO: &[&str] = &[
    "nie wiem",
    "być może",
    "hehe))))))))))))))))))",
    "może kiedyś",
    "jeszcze nie wiem",
    "daj mi chwilę to się zastanowię",
    "tego nawet najstarsi górale nie wiedzą",
    "a jebnąć ci ciupaską?",
    "a co ja jestem, informacja turystyczna?",
];

/// Probability of a "yes" family answer
const P_YES: f64 = 0.45;

/// Probability of "no" once "yes" was not drawn
const P_NO_GIVEN_NOT_YES: f64 = 9.0 / 11.0;

/// Pick an answer using the given random source
pub fn answer<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    let family = if rng.gen_bool(P_YES) {
        YES
    } else if rng.gen_bool(P_NO_GIVEN_NOT_YES) {
        NO
    } else {
        DUNNO
    };

    family.choose(rng).copied().unwrap_or("nie wiem")
}

/// Random yes/no/dunno reply
#[derive(Debug, Clone, Copy, Default)]
pub struct MagicBall;

#[async_trait]
impl Handler for MagicBall {
    fn description(&self) -> &str {
        "Taki magic 8-ball, tyle że nie"
    }

    async fn react(
        &self,
        _ctx: &Context<'_>,
        _message: &IncomingMessage,
        _text: &str,
    ) -> Result<Vec<Action>> {
        let reply = answer(&mut rand::thread_rng());
        Ok(vec![Action::Reply(reply.to_string())])
    }
}

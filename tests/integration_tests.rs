//! Integration tests for the session client
//!
//! Each test plays the server side of a session over an in-memory duplex
//! stream, reading the client's commands and scripting the replies.

use client::{Credentials, ObservationEvent, Session, SessionConfig, SessionError};
use protocol::{ChatKind, Color};
use std::time::Duration;
use tokio::io::{
    duplex, split, AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, ReadHalf, WriteHalf,
};
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

/// Scripted server end of a session
struct Server {
    reader: BufReader<ReadHalf<DuplexStream>>,
    writer: WriteHalf<DuplexStream>,
}

impl Server {
    /// Asserts the next command the client wrote
    async fn expect(&mut self, command: &str) {
        let mut line = String::new();
        timeout(WAIT, self.reader.read_line(&mut line))
            .await
            .expect("timed out waiting for the client")
            .unwrap();
        assert_eq!(line, format!("{command}\r\n"));
    }

    async fn say(&mut self, text: &str) {
        self.writer.write_all(text.as_bytes()).await.unwrap();
        self.writer.flush().await.unwrap();
    }
}

fn start(config: SessionConfig) -> (Session, Server) {
    let (client_end, server_end) = duplex(64 * 1024);
    let session = Session::start(client_end, config);
    let (read_half, write_half) = split(server_end);

    let server = Server {
        reader: BufReader::new(read_half),
        writer: write_half,
    };

    (session, server)
}

fn ply(game: u32, number: u32, san: &str) -> String {
    format!(
        "<12> rnbqkbnr pppppppp -------- -------- ----P--- -------- PPPP-PPP RNBQKBNR B 4 1 1 1 1 0 {game} CANABLANCA GriffySr 0 5 0 39 39 300 300 {number} P/e2-e4 (0:00) {san} 0 0 0\n"
    )
}

/// LOGIN TESTS
mod login_tests {
    use super::*;

    /// Prompts, banner and idle prompt resolve the login with the banner's handle
    #[tokio::test]
    async fn credentialed_login_sends_setup() {
        let (session, mut server) = start(SessionConfig::default());
        let login = session.login(Some(Credentials::new("alice", "secret")));

        server.say("Welcome to the Free Internet Chess Server\n\rlogin: ").await;
        server.expect("alice").await;
        server.say("password: ").await;
        server.expect("secret").await;
        server.say("**** Starting FICS session as GuestABCD ****\n").await;
        server.say("fics% ").await;

        server.expect("set prompt").await;
        server.expect("set seek 0").await;
        server.expect("set style 12").await;

        let outcome = timeout(WAIT, login).await.unwrap().unwrap();
        assert_eq!(outcome.username, "GuestABCD");
    }

    /// A rejected password fails the login and nothing else is sent
    #[tokio::test]
    async fn invalid_password_sends_nothing_more() {
        let (session, mut server) = start(SessionConfig::default());
        let login = session.login(Some(Credentials::new("alice", "wrong")));

        server.say("login: ").await;
        server.expect("alice").await;
        server.say("password: ").await;
        server.expect("wrong").await;
        server.say("**** Invalid password! ****\nfics% ").await;

        let result = timeout(WAIT, login).await.unwrap();
        assert!(matches!(result, Err(SessionError::Authentication)));

        // The next thing on the wire is the caller's own command
        let shout = session.shout("still here");
        server.expect("shout still here").await;
        server.say("(shouted to 10 players)\n").await;
        assert!(timeout(WAIT, shout).await.unwrap().unwrap());
    }

    /// The keepalive command repeats once the session is ready
    #[tokio::test]
    async fn keepalive_starts_at_ready() {
        let config = SessionConfig::default()
            .with_setup_commands(Vec::<String>::new())
            .with_keepalive(Duration::from_millis(20), "uptime");
        let (session, mut server) = start(config);
        let login = session.login(None);

        server.say("login: ").await;
        server.expect("guest").await;
        server.say("Press return to enter the server as \"GuestWXYZ\": ").await;
        server.expect("").await;
        server.say("**** Starting FICS session as GuestWXYZ(U) ****\nfics% ").await;

        assert_eq!(
            timeout(WAIT, login).await.unwrap().unwrap().username,
            "GuestWXYZ(U)"
        );
        server.expect("uptime").await;
        server.expect("uptime").await;
    }
}

/// COMMAND CORRELATION TESTS
mod command_tests {
    use super::*;

    /// Blocking commands reach the wire one at a time, in order
    #[tokio::test]
    async fn blocking_commands_are_serialized() {
        let (session, mut server) = start(SessionConfig::default());

        let games = session.games();
        let who = session.who();
        let shout = session.shout("marker");

        server.expect("games").await;
        server.expect("shout marker").await;
        server
            .say("32 2715 GMIvanchuk  2862 GMCarlsen  [ su120   0] 1:52:33 -1:41:23 (28-28) B: 18\n")
            .await;
        server.say("(shouted to 5 players)\n").await;
        server.say("1 games displayed.\n").await;

        server.expect("who").await;
        server.say("2100^Bob(C)      1823.Alice(TM)\n").await;
        server
            .say("2 players displayed (of 2). (*) indicates system administrator.\n")
            .await;

        let games = timeout(WAIT, games).await.unwrap().unwrap();
        assert_eq!(games.len(), 1);
        assert_eq!(games[0].to_move, Color::Black);

        let who = timeout(WAIT, who).await.unwrap().unwrap();
        assert_eq!(who.len(), 2);
        assert_eq!(who[1].name, "Alice");

        assert!(timeout(WAIT, shout).await.unwrap().unwrap());
    }

    /// Every concurrent non-blocking command is written and answered
    #[tokio::test]
    async fn concurrent_commands_all_resolve() {
        let (session, mut server) = start(SessionConfig::default());

        let replies: Vec<_> = (0..4)
            .map(|n| session.tell("Bob", &format!("message {n}")))
            .collect();

        for n in 0..4 {
            server.expect(&format!("tell Bob message {n}")).await;
        }
        server.say("(told Bob)\n").await;

        for reply in replies {
            assert!(timeout(WAIT, reply).await.unwrap().unwrap());
        }
    }

    /// A continuation line split across reads is joined onto its parent
    #[tokio::test]
    async fn continuation_across_reads() {
        let (session, mut server) = start(SessionConfig::default());
        let observers = session.observers(93);

        server.expect("allobservers 93").await;
        server.say("Observing 93 [Alice vs. Bob]: Carl Dora\n\\ E").await;
        server.say("ve (3 users)\n").await;

        let names = timeout(WAIT, observers).await.unwrap().unwrap();
        assert_eq!(names, vec!["Carl", "Dora", "Eve"]);
    }

    /// Channel membership changes are acknowledged per channel
    #[tokio::test]
    async fn channel_commands() {
        let (session, mut server) = start(SessionConfig::default());

        let join = session.join_channel(50);
        server.expect("+channel 50").await;
        server.say("[50] added to your channel list.\n").await;
        assert!(timeout(WAIT, join).await.unwrap().unwrap());

        let listing = session.channels();
        server.expect("=channel").await;
        server.say("-- channel list: 2 channels --\n4     50\n").await;
        let channels = timeout(WAIT, listing).await.unwrap().unwrap();
        assert_eq!(channels.len(), 2);

        let leave = session.leave_channel(7);
        server.expect("-channel 7").await;
        server.say("[7] is not in your channel list.\n").await;
        assert!(!timeout(WAIT, leave).await.unwrap().unwrap());
    }

    /// A queued command that times out is withdrawn before it is written
    #[tokio::test]
    async fn timed_out_command_is_never_written() {
        let (session, mut server) = start(SessionConfig::default());
        let games = session.games();
        let who = session.who();

        server.expect("games").await;
        let result = session.with_timeout(who, Duration::from_millis(20)).await;
        assert!(matches!(result, Err(SessionError::Cancelled)));

        server.say("0 games displayed.\n").await;
        assert!(timeout(WAIT, games).await.unwrap().unwrap().is_empty());

        // The queue moved past the withdrawn command
        let shout = session.shout("next");
        server.expect("shout next").await;
        server.say("(shouted to 3 players)\n").await;
        assert!(timeout(WAIT, shout).await.unwrap().unwrap());
    }

    /// Cancelling a written command fails its reply and frees the queue
    #[tokio::test]
    async fn cancelled_command_releases_queue() {
        let (session, mut server) = start(SessionConfig::default());
        let games = session.games();
        let sought = session.sought();

        server.expect("games").await;
        session.cancel(&games);
        assert!(matches!(
            timeout(WAIT, games).await.unwrap(),
            Err(SessionError::Cancelled)
        ));

        server.expect("sought").await;
        server.say("0 ads displayed.\n").await;
        assert!(timeout(WAIT, sought).await.unwrap().unwrap().is_empty());
    }

    /// Closing the connection fails whatever is still pending
    #[tokio::test]
    async fn server_close_fails_pending() {
        let (session, mut server) = start(SessionConfig::default());
        let games = session.games();
        let sought = session.sought();

        server.expect("games").await;
        drop(server);

        assert!(matches!(
            timeout(WAIT, games).await.unwrap(),
            Err(SessionError::ConnectionClosed)
        ));
        assert!(matches!(
            timeout(WAIT, sought).await.unwrap(),
            Err(SessionError::ConnectionClosed)
        ));
        session.close().await.unwrap();
    }
}

/// OBSERVATION AND CHAT TESTS
mod observation_tests {
    use super::*;

    /// Start, three plies and a whisper arrive in order, then the result
    #[tokio::test]
    async fn observed_game_runs_to_completion() {
        let (session, mut server) = start(SessionConfig::default());
        let mut observation = session.observe(47);

        server.expect("observe 47").await;
        server
            .say("You are now observing game 47.\nGame 47: CANABLANCA (1776) GriffySr (2094) rated blitz 5 0\n")
            .await;
        server.say(&ply(47, 1, "e4")).await;
        server.say(&ply(12, 9, "Nf3")).await;
        server.say(&ply(47, 1, "c5")).await;
        server.say(&ply(47, 2, "Nf3")).await;
        server.say("GriffySr(C)(2094)[47] whispers: ply=4; eval=-3.74\n").await;
        server
            .say("{Game 47 (CANABLANCA vs. GriffySr) CANABLANCA resigns} 0-1\n")
            .await;
        server.say("\nRemoving game 47 from observation list.\n").await;

        let mut events = Vec::new();
        while let Some(event) = timeout(WAIT, observation.next_event()).await.unwrap() {
            events.push(event);
        }

        assert_eq!(events.len(), 5);
        match &events[0] {
            ObservationEvent::Started(start) => {
                assert_eq!(start.white.name, "CANABLANCA");
                assert_eq!(start.white.rating, "1776");
                assert_eq!(start.black.name, "GriffySr");
                assert_eq!(start.black.rating, "2094");
                assert!(start.rated);
                assert_eq!(start.variant, "blitz");
            }
            other => panic!("Expected start event, got {:?}", other),
        }
        let moves: Vec<&str> = events[1..4]
            .iter()
            .map(|event| match event {
                ObservationEvent::Move(ply) => ply.algebraic_move.as_str(),
                other => panic!("Expected move event, got {:?}", other),
            })
            .collect();
        assert_eq!(moves, vec!["e4", "c5", "Nf3"]);
        match &events[4] {
            ObservationEvent::Chat(chat) => assert_eq!(chat.user, "GriffySr(C)(2094)"),
            other => panic!("Expected chat event, got {:?}", other),
        }

        let result = timeout(WAIT, observation.finish()).await.unwrap().unwrap();
        assert_eq!(result, Some("0-1".to_string()));
    }

    /// Unobserving ends the watch with no result and silences the game
    #[tokio::test]
    async fn unobserve_before_removal() {
        let (session, mut server) = start(SessionConfig::default());
        let mut observation = session.observe(47);

        server.expect("observe 47").await;
        server
            .say("Game 47: CANABLANCA (1776) GriffySr (2094) rated blitz 5 0\n")
            .await;
        assert!(matches!(
            timeout(WAIT, observation.next_event()).await.unwrap(),
            Some(ObservationEvent::Started(_))
        ));

        let unobserve = session.unobserve(47);
        server.expect("unobserve 47").await;
        server.say(&ply(47, 3, "Bc4")).await;
        server.say("Removing game 47 from observation list.\n").await;

        assert!(timeout(WAIT, unobserve).await.unwrap().unwrap());
        assert_eq!(timeout(WAIT, observation.next_event()).await.unwrap(), None);
        assert_eq!(timeout(WAIT, observation.finish()).await.unwrap().unwrap(), None);
    }

    /// Chat lines reach the feed, other traffic does not
    #[tokio::test]
    async fn chat_feed_receives_messages() {
        let (session, mut server) = start(SessionConfig::default());
        let mut chat = session.chat();
        let lines = session.lines();

        server
            .say("fics% Bob shouts: hello\n42 games displayed.\nAlice tells you: hi\n")
            .await;

        let shout = timeout(WAIT, chat.next()).await.unwrap().unwrap();
        assert_eq!(shout.kind, ChatKind::Shout);
        assert_eq!(shout.message, "hello");

        let tell = timeout(WAIT, chat.next()).await.unwrap().unwrap();
        assert_eq!(tell.kind, ChatKind::Tell);
        assert_eq!(tell.user, "Alice");

        drop(lines);
        session.close().await.unwrap();
        assert!(timeout(WAIT, chat.next()).await.unwrap().is_none());
    }
}

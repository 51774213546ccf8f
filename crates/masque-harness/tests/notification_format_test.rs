//! Wire format of the notifications handed to the rendering adapter.

use masque_harness::{Operation, SessionWorld};
use masque_server::Notification;

fn last_render(world: &SessionWorld) -> Notification {
    world.engine().last_notification(SessionWorld::ROOM).cloned().unwrap()
}

#[test]
fn lobby_render_format() {
    let mut world = SessionWorld::new(0).unwrap();
    world.apply(&Operation::Create).unwrap();
    world.apply(&Operation::Join { seat: 1 }).unwrap();
    world.apply(&Operation::SetReady { seat: 1, ready: true }).unwrap();

    insta::assert_json_snapshot!(last_render(&world), @r###"
    {
      "type": "render",
      "roomId": 1,
      "snapshot": {
        "id": 1,
        "host": 1,
        "gamemode": "classic",
        "language": "en",
        "state": "waiting",
        "lobbyStatus": "waiting",
        "gamePhase": "none",
        "settings": {
          "maxGuesses": 0,
          "timeLimit": 60,
          "category": null
        },
        "players": [
          {
            "id": 1,
            "ready": false,
            "wantsToQuit": false,
            "identity": null,
            "target": null,
            "notes": []
          },
          {
            "id": 2,
            "ready": true,
            "wantsToQuit": false,
            "identity": null,
            "target": null,
            "notes": []
          }
        ],
        "readyCount": 1,
        "quitCount": 0,
        "neededToQuit": 2,
        "roundOrder": null,
        "currentPlayer": null,
        "expiryArmed": true,
        "countdownArmed": false
      }
    }
    "###);
}

#[test]
fn closed_notification_carries_reason() {
    let mut world = SessionWorld::new(0).unwrap();
    world.apply(&Operation::Create).unwrap();
    world.apply(&Operation::Cancel { seat: 0 }).unwrap();

    let closed = last_render(&world);
    insta::assert_json_snapshot!(closed, {
        ".snapshot" => "[snapshot]",
    }, @r###"
    {
      "type": "closed",
      "roomId": 1,
      "reason": "byHost",
      "snapshot": "[snapshot]"
    }
    "###);
}

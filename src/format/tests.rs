use rstest::rstest;

use super::*;

#[rstest]
#[case("increment", "INCREMENT")]
#[case("INCREMENT", "INCREMENT")]
#[case("setValue", "SET_VALUE")]
#[case("set_value", "SET_VALUE")]
#[case("my-list", "MY_LIST")]
#[case("add item", "ADD_ITEM")]
#[case("loadV2Items", "LOAD_V2_ITEMS")]
#[case("-trailing-", "TRAILING")]
fn converts_to_screaming_snake(#[case] input: &str, #[case] expected: &str) {
    assert_eq!(screaming_snake(input), expected);
}

#[test]
fn prefix_is_joined_with_underscore() {
    assert_eq!(ScreamingSnake.format(Some("myList"), "addItem"), "MY_LIST_ADD_ITEM");
    assert_eq!(ScreamingSnake.format(Some(""), "addItem"), "ADD_ITEM");
    assert_eq!(ScreamingSnake.format(None, "addItem"), "ADD_ITEM");
}

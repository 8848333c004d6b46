//! Built-in translations.

type Table = Vec<(&'static str, Vec<(&'static str, &'static str)>)>;

pub fn table() -> Table {
    vec![
        (
            "en",
            vec![
                (
                    "start.greeting",
                    "Hi! I can roll dice (/random), pick for you (/choose a | b) and answer questions (/neuro or #neuro).",
                ),
                ("random.result", "🎲 {value} (from {min} to {max})"),
                ("random.reroll", "Roll again"),
                ("random.usage", "Usage: /random [max] or /random <min> <max>"),
                ("choose.result", "I choose: {choice}"),
                ("choose.usage", "Usage: /choose option 1 | option 2 | ..."),
                ("neuro.usage", "Ask me something: /neuro <question>"),
                ("neuro.disabled", "The neural network is turned off on this bot."),
                ("ratelimit.notice", "Slow down! You are sending commands too fast."),
            ],
        ),
        (
            "ru",
            vec![
                (
                    "start.greeting",
                    "Привет! Я умею бросать кубик (/random), выбирать за вас (/choose a | b) и отвечать на вопросы (/neuro или #neuro).",
                ),
                ("random.result", "🎲 {value} (от {min} до {max})"),
                ("random.reroll", "Ещё раз"),
                ("random.usage", "Использование: /random [max] или /random <min> <max>"),
                ("choose.result", "Я выбираю: {choice}"),
                ("choose.usage", "Использование: /choose вариант 1 | вариант 2 | ..."),
                ("neuro.usage", "Спросите меня: /neuro <вопрос>"),
                ("neuro.disabled", "Нейросеть на этом боте отключена."),
                ("ratelimit.notice", "Помедленнее! Вы отправляете команды слишком часто."),
            ],
        ),
    ]
}

//! Prompt text generators
//!
//! Fixed bodies of text used to build long inputs, cache prefixes and
//! per-request unique prompts.

use chrono::Utc;

/// Base sentence repeated by [`stress_prompt`], roughly 50 tokens
const STRESS_BASE: &str = "这是一段用于压力测试的文本内容。我们要模拟大约8000个token的输入压力。为了达到这个目标，我们需要不断重复这段文字，直到它足够长。";

/// Estimated tokens per character for the Chinese AI-topic block
pub const TOKENS_PER_CHAR: f64 = 0.58;

/// Multi-paragraph AI-topic block used by [`long_context`]
const AI_TOPICS: &str = r#"
人工智能（Artificial Intelligence，简称AI）是计算机科学的一个分支，它企图了解智能的实质，
并生产出一种新的能以人类智能相似的方式做出反应的智能机器。该领域的研究包括机器人、语言识别、
图像识别、自然语言处理和专家系统等。人工智能从诞生以来，理论和技术日益成熟，应用领域也不断扩大，
可以设想，未来人工智能带来的科技产品，将会是人类智慧的"容器"。人工智能可以对人的意识、
思维的信息过程的模拟。人工智能不是人的智能，但能像人那样思考、也可能超过人的智能。

机器学习是人工智能的一个重要分支，它使用算法来解析数据、从中学习，然后对真实世界中的事件做出决策和预测。
与传统的为解决特定任务、硬编码的软件程序不同，机器学习是用大量的数据来"训练"，通过各种算法从数据中学习如何完成任务。
深度学习是机器学习的一个子集，它使用多层神经网络来模拟人脑的工作方式，从而实现对复杂模式的识别和学习。

自然语言处理（NLP）是人工智能和语言学领域的分支学科。此领域探讨如何处理及运用自然语言；
自然语言处理包括多方面和步骤，基本有认知、理解、生成等部分。自然语言认知和理解是让电脑把输入的语言变成有意思的符号和关系，
然后根据目的再处理。自然语言生成系统则是把计算机数据转化为自然语言。

计算机视觉是一门研究如何使机器"看"的科学，更进一步的说，就是指用摄影机和电脑代替人眼对目标进行识别、跟踪和测量等机器视觉，
并进一步做图形处理，使电脑处理成为更适合人眼观察或传送给仪器检测的图像。作为一个科学学科，计算机视觉研究相关的理论和技术，
试图建立能够从图像或者多维数据中获取"信息"的人工智能系统。

强化学习是机器学习的一个重要分支，它通过与环境的交互来学习最优策略。在强化学习中，智能体通过尝试不同的动作，
观察环境的反馈（奖励或惩罚），逐步学习如何在给定的环境中做出最优决策。强化学习已经在游戏、机器人控制、
自动驾驶等领域取得了显著的成果。AlphaGo就是强化学习的一个典型应用，它通过自我对弈学习围棋，最终击败了人类顶尖棋手。

生成对抗网络（GAN）是一种深度学习模型，由生成器和判别器两个神经网络组成。生成器负责生成假数据，判别器负责区分真假数据。
两个网络相互对抗、相互学习，最终生成器能够生成非常逼真的数据。GAN在图像生成、图像修复、风格迁移等领域有广泛应用。

Transformer是一种基于自注意力机制的神经网络架构，它在自然语言处理领域取得了革命性的突破。
BERT、GPT等大型语言模型都是基于Transformer架构构建的。Transformer的核心思想是通过自注意力机制，
让模型能够同时关注输入序列中的所有位置，从而更好地捕捉长距离依赖关系。
"#;

/// Literary excerpt for prefix caching (above the 256-token cache minimum)
const LITERARY_EXCERPT: &str = r#"
You are a literary analysis assistant. Answer concisely and clearly.

Here is an excerpt from "The Gift of the Magi" by O. Henry:

One dollar and eighty-seven cents. That was all. And sixty cents of it was in pennies. 
Pennies saved one and two at a time by bulldozing the grocer and the vegetable man and 
the butcher until one's cheeks burned with the silent imputation of parsimony that such 
close dealing implied. Three times Della counted it. One dollar and eighty-seven cents. 
And the next day would be Christmas.

There was clearly nothing to do but flop down on the shabby little couch and howl. 
So Della did it. Which instigates the moral reflection that life is made up of sobs, 
sniffles, and smiles, with sniffles predominating.

While the mistress of the home is gradually subsiding from the first stage to the second, 
take a look at the home. A furnished flat at $8 per week. It did not exactly beggar 
description, but it certainly had that word on the lookout for the mendicancy squad.

In the vestibule below was a letter-box into which no letter would go, and an electric 
button from which no mortal finger could coax a ring. Also appertaining thereunto was a 
card bearing the name "Mr. James Dillingham Young."

The "Dillingham" had been flung to the breeze during a former period of prosperity when 
its possessor was being paid $30 per week. Now, when the income was shrunk to $20, though, 
they were thinking seriously of contracting to a modest and unassuming D. But whenever 
Mr. James Dillingham Young came home and reached his flat above he was called "Jim" and 
greatly hugged by Mrs. James Dillingham Young, already introduced to you as Della. Which 
is all very good.

Della finished her cry and attended to her cheeks with the powder rag. She stood by the 
window and looked out dully at a gray cat walking a gray fence in a gray backyard. 
Tomorrow would be Christmas Day, and she had only $1.87 with which to buy Jim a present. 
She had been saving every penny she could for months, with this result. Twenty dollars a 
week doesn't go far. Expenses had been greater than she had calculated. They always are. 
Only $1.87 to buy a present for Jim. Her Jim. Many a happy hour she had spent planning 
for something nice for him. Something fine and rare and sterling—something just a little 
bit near to being worthy of the honor of being owned by Jim.
"#;

/// Short history of AI used for long-context chat
const AI_HISTORY: &str = r#"
        The history of artificial intelligence (AI) dates back to the 1950s. 
        In 1956, at the Dartmouth Conference, the term "artificial intelligence" was first coined.
        
        Early AI research focused on symbolic reasoning and expert systems. Notable achievements include:
        1. ELIZA - an early natural language processing program
        2. SHRDLU - a natural language understanding system
        3. Expert systems like MYCIN for medical diagnosis
        
        However, due to computational limitations and algorithmic constraints, AI experienced two "AI winters" 
        in the 1970s and 1980s.
        
        In the 21st century, with the development of big data, cloud computing, and deep learning, 
        AI has experienced a renaissance. The breakthrough performance of AlexNet in the 2012 ImageNet 
        competition marked the beginning of the deep learning era.
        
        Recently, large language models (LLMs) have sparked a new AI revolution. Models like GPT and Claude 
        demonstrate powerful language understanding and generation capabilities, transforming how we interact 
        with technology.
        "#;

/// Stress prompt of roughly `token_count` tokens
pub fn stress_prompt(token_count: usize) -> String {
    STRESS_BASE.repeat((token_count / 50).max(1))
}

/// Number of AI-topic sections needed to reach `target_tokens`
pub fn long_context_sections(target_tokens: usize) -> usize {
    let tokens_per_block = AI_TOPICS.chars().count() as f64 * TOKENS_PER_CHAR;
    (target_tokens as f64 / tokens_per_block) as usize + 1
}

/// Long Chinese text of at least `target_tokens` estimated tokens
///
/// Each repetition is prefixed by `=== Section i / n ===` so sections differ.
pub fn long_context(target_tokens: usize) -> String {
    let sections = long_context_sections(target_tokens);
    let mut text = String::with_capacity(sections * (AI_TOPICS.len() + 32));
    for i in 1..=sections {
        text.push_str(&format!("\n\n=== Section {} / {} ===\n", i, sections));
        text.push_str(AI_TOPICS);
    }
    text
}

/// Estimated token count of text built from the AI-topic block
pub fn estimate_tokens(text: &str) -> usize {
    (text.chars().count() as f64 * TOKENS_PER_CHAR) as usize
}

/// System prompt carrying the literary excerpt
pub fn literary_excerpt() -> &'static str {
    LITERARY_EXCERPT
}

/// AI history article repeated `repeats` times
pub fn ai_history_article(repeats: usize) -> String {
    AI_HISTORY.repeat(repeats.max(1))
}

/// English text of at least `min_words` whitespace-separated words
pub fn long_english_text(min_words: usize) -> String {
    let per_copy = word_count(AI_HISTORY).max(1);
    let copies = (min_words + per_copy - 1) / per_copy;
    AI_HISTORY.repeat(copies.max(1))
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Millisecond timestamp that keeps otherwise identical content unique
pub fn unique_marker() -> String {
    Utc::now().timestamp_millis().to_string()
}
